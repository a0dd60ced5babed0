use crate::{NameComparison, Parameter};

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fragment {
    #[default]
    None,
    SqlDeleteFrom,
    SqlDeleteFromWhere,
    SqlInsertInto,
    SqlInsertIntoValues,
    SqlProcedureCall,
    SqlSelect,
    SqlSelectFrom,
    SqlSelectOrderBy,
    SqlSelectWhere,
    SqlUpdate,
    SqlUpdateSet,
    SqlUpdateWhere,
}

/// State carried while a statement is written: the clause being written and the
/// parameters bound so far, in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub fragment: Fragment,
    pub comparison: NameComparison,
    pub parameters: Vec<Parameter>,
}

impl Context {
    pub fn new(fragment: Fragment, comparison: NameComparison) -> Self {
        Self {
            fragment,
            comparison,
            parameters: Vec::new(),
        }
    }

    /// Position the next bound parameter will take, starting from 1.
    pub fn next_index(&self) -> usize {
        self.parameters.len() + 1
    }

    pub fn switch_fragment(&mut self, fragment: Fragment) -> &mut Self {
        self.fragment = fragment;
        self
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new(Fragment::None, NameComparison::default())
    }
}
