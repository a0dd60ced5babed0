use crate::{
    DataSource, Error, ObjectName, OperationBuilder, OperationDescriptor, Provider, Result,
    TransactionScope, Value,
};
use std::{
    future::Future,
    ops::{Deref, DerefMut},
};

type ConnectionOf<E> = <<E as Executor>::Provider as Provider>::Connection;

/// Connection handed to an execution: opened for it, or borrowed from the transaction
/// scope that owns it. An owned connection is released when the lease is dropped.
pub enum Lease<'a, C> {
    Owned(C),
    Borrowed(&'a mut C),
}

impl<C> Deref for Lease<'_, C> {
    type Target = C;

    fn deref(&self) -> &Self::Target {
        match self {
            Lease::Owned(v) => v,
            Lease::Borrowed(v) => v,
        }
    }
}

impl<C> DerefMut for Lease<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match self {
            Lease::Owned(v) => v,
            Lease::Borrowed(v) => v,
        }
    }
}

/// Something operations can run against: a data source, opening one connection per
/// execution, or a transaction scope, running every command on its own connection in
/// issue order.
pub trait Executor: Send {
    type Provider: Provider;

    fn data_source(&self) -> &DataSource<Self::Provider>;

    fn acquire(&mut self) -> Result<Lease<'_, ConnectionOf<Self>>>;

    fn acquire_async(
        &mut self,
    ) -> impl Future<Output = Result<Lease<'_, ConnectionOf<Self>>>> + Send;

    /// Query the rows of a table or view.
    fn from(self, object: impl Into<ObjectName>) -> OperationBuilder<Self>
    where
        Self: Sized,
    {
        OperationBuilder::new(self, OperationDescriptor::query(object))
    }

    fn insert<K, V>(
        self,
        object: impl Into<ObjectName>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> OperationBuilder<Self>
    where
        Self: Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        OperationBuilder::new(self, OperationDescriptor::insert(object).with_parameters(values))
    }

    /// Update the row identified by the primary key values among `values`.
    fn update<K, V>(
        self,
        object: impl Into<ObjectName>,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> OperationBuilder<Self>
    where
        Self: Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        OperationBuilder::new(self, OperationDescriptor::update(object).with_parameters(values))
    }

    fn delete<K, V>(
        self,
        object: impl Into<ObjectName>,
        keys: impl IntoIterator<Item = (K, V)>,
    ) -> OperationBuilder<Self>
    where
        Self: Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        OperationBuilder::new(self, OperationDescriptor::delete(object).with_parameters(keys))
    }

    fn procedure<K, V>(
        self,
        object: impl Into<ObjectName>,
        parameters: impl IntoIterator<Item = (K, V)>,
    ) -> OperationBuilder<Self>
    where
        Self: Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        OperationBuilder::new(
            self,
            OperationDescriptor::procedure(object).with_parameters(parameters),
        )
    }

    /// Run `text` as is, binding `parameters` by name.
    fn sql<K, V>(
        self,
        text: impl Into<String>,
        parameters: impl IntoIterator<Item = (K, V)>,
    ) -> OperationBuilder<Self>
    where
        Self: Sized,
        K: Into<String>,
        V: Into<Value>,
    {
        OperationBuilder::new(self, OperationDescriptor::raw_sql(text).with_parameters(parameters))
    }

    /// Run a prepared descriptor.
    fn operation(self, descriptor: OperationDescriptor) -> OperationBuilder<Self>
    where
        Self: Sized,
    {
        OperationBuilder::new(self, descriptor)
    }
}

impl<P: Provider> Executor for &DataSource<P> {
    type Provider = P;

    fn data_source(&self) -> &DataSource<P> {
        self
    }

    fn acquire(&mut self) -> Result<Lease<'_, P::Connection>> {
        Ok(Lease::Owned(self.provider().open()?))
    }

    fn acquire_async(&mut self) -> impl Future<Output = Result<Lease<'_, P::Connection>>> + Send {
        let provider = self.provider();
        async move { Ok(Lease::Owned(provider.open_async().await?)) }
    }
}

impl<P: Provider> Executor for &mut TransactionScope<'_, P> {
    type Provider = P;

    fn data_source(&self) -> &DataSource<P> {
        TransactionScope::data_source(self)
    }

    fn acquire(&mut self) -> Result<Lease<'_, P::Connection>> {
        Ok(Lease::Borrowed(self.connection()?))
    }

    fn acquire_async(&mut self) -> impl Future<Output = Result<Lease<'_, P::Connection>>> + Send {
        let connection = self.connection().map(Lease::Borrowed);
        async move { connection }
    }
}

pub(crate) fn closed_scope() -> Error {
    Error::InvalidOperation("The transaction scope was already committed or rolled back".into())
}
