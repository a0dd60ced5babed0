#[cfg(test)]
mod tests {
    use conduit::{AsValue, Error, Value};
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use time::macros::{date, datetime, time};
    use uuid::Uuid;

    #[test]
    fn integers() {
        assert_eq!(Value::from(5i8), Value::Int8(Some(5)));
        assert_eq!(Value::from(5u64), Value::UInt64(Some(5)));
        assert_eq!(i64::try_from_value(Value::Int8(Some(-3))).unwrap(), -3);
        assert_eq!(u8::try_from_value(Value::Int64(Some(255))).unwrap(), 255);
        assert!(matches!(
            u8::try_from_value(Value::Int64(Some(256))),
            Err(Error::Conversion { .. })
        ));
        assert!(matches!(
            u32::try_from_value(Value::Int32(Some(-1))),
            Err(Error::Conversion { .. })
        ));
        assert_eq!(
            i32::try_from_value(Value::Decimal(Some(Decimal::from(12)))).unwrap(),
            12
        );
        assert!(matches!(
            i32::try_from_value(Value::Decimal(Some(Decimal::from_str("1.5").unwrap()))),
            Err(Error::Conversion { .. })
        ));
        assert!(matches!(
            i16::try_from_value(Value::Varchar(Some("1".into()))),
            Err(Error::Conversion { .. })
        ));
        assert!(bool::try_from_value(Value::Int64(Some(1))).unwrap());
    }

    #[test]
    fn nulls() {
        assert!(Value::Null.is_null());
        assert!(Value::Varchar(None).is_null());
        assert!(!Value::Varchar(Some(String::new())).is_null());
        assert_eq!(Value::from(None::<i32>), Value::Int32(None));
        assert_eq!(Value::from(Some("x".to_string())), Value::from("x"));
        assert_eq!(Option::<i64>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i64>::try_from_value(Value::Int64(None)).unwrap(), None);
        assert_eq!(
            Option::<i64>::try_from_value(Value::Int32(Some(8))).unwrap(),
            Some(8)
        );
        assert!(matches!(
            String::try_from_value(Value::Null),
            Err(Error::NullConversion { .. })
        ));
        assert_eq!(Value::Int32(None).to_string(), "NULL");
    }

    #[test]
    fn decimals() {
        let expected = Decimal::from_str("1234.56").unwrap();
        assert_eq!(
            Decimal::try_from_value(Value::Varchar(Some(" 1234.56 ".into()))).unwrap(),
            expected
        );
        assert_eq!(
            Decimal::try_from_value(Value::Float64(Some(0.5))).unwrap(),
            Decimal::from_str("0.5").unwrap()
        );
        assert_eq!(Decimal::try_from_value(Value::Int64(Some(7))).unwrap(), Decimal::from(7));
        assert_eq!(
            f64::try_from_value(Value::Decimal(Some(Decimal::from_str("2.25").unwrap()))).unwrap(),
            2.25
        );
        assert!(matches!(
            Decimal::try_from_value(Value::Varchar(Some("12,5".into()))),
            Err(Error::Conversion { .. })
        ));
    }

    #[test]
    fn temporal() {
        assert_eq!(
            time::Date::try_from_value(Value::from("2024-02-29")).unwrap(),
            date!(2024 - 02 - 29)
        );
        assert_eq!(
            time::Time::try_from_value(Value::from("13:45:10.25")).unwrap(),
            time!(13:45:10.25)
        );
        assert_eq!(
            time::PrimitiveDateTime::try_from_value(Value::from("2024-02-29T13:45:10")).unwrap(),
            datetime!(2024-02-29 13:45:10)
        );
        assert_eq!(
            time::OffsetDateTime::try_from_value(Value::from("2024-02-29 13:45:10+02:00")).unwrap(),
            datetime!(2024-02-29 13:45:10 +2)
        );
        assert_eq!(
            time::Date::try_from_value(Value::Timestamp(Some(datetime!(2020-01-02 03:04:05))))
                .unwrap(),
            date!(2020 - 01 - 02)
        );
        assert!(matches!(
            time::Date::try_from_value(Value::from("2024-02-30")),
            Err(Error::Conversion { .. })
        ));
        assert_eq!(Value::from(date!(2024 - 01 - 05)).to_string(), "2024-01-05");
    }

    #[test]
    fn uuids() {
        let text = "0b5e7f7c-6b36-4c8e-9d59-7b0f6d7e5a11";
        let uuid = Uuid::parse_str(text).unwrap();
        assert_eq!(Uuid::try_from_value(Value::from(text)).unwrap(), uuid);
        assert_eq!(
            Uuid::try_from_value(Value::Blob(Some(uuid.as_bytes().to_vec().into()))).unwrap(),
            uuid
        );
        assert_eq!(Value::from(uuid), Value::Uuid(Some(uuid)));
        assert!(matches!(
            Uuid::try_from_value(Value::from("not-a-uuid")),
            Err(Error::Conversion { .. })
        ));
    }

    #[test]
    fn display() {
        assert_eq!(Value::from("it's").to_string(), "'it's'");
        assert_eq!(Value::from(vec![1u8, 2, 3]).to_string(), "<3 bytes>");
        assert_eq!(Value::from(true).to_string(), "true");
        assert_eq!(Value::from(2.5f64).type_name(), "FLOAT64");
    }
}
