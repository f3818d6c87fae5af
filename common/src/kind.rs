//! Macros for defining kind enums.

/// Macro for defining a kind enum stored as a small integer.
///
/// Generated enum:
/// - is rendered and parsed in `SCREAMING_SNAKE_CASE` (via [`strum`]);
/// - is (de)serialized in `SCREAMING_SNAKE_CASE` with the `serde` feature;
/// - maps onto `INT2` SQL type with the `postgres` feature.
///
/// Features are checked in the crate invoking the macro.
///
/// # Example
///
/// ```rust
/// # use common::define_kind;
/// define_kind! {
///     #[doc = "Shape kind."]
///     enum Kind {
///         #[doc = "A cube"]
///         Cube = 1,
///
///         #[doc = "A sphere"]
///         Sphere = 2,
///     }
/// }
///
/// assert_eq!(Kind::from_u8(2), Some(Kind::Sphere));
/// assert_eq!(Kind::ALL, [Kind::Cube, Kind::Sphere]);
/// assert_eq!(Kind::Cube.to_string(), "CUBE");
/// ```
///
/// [`strum`]: https://docs.rs/strum
#[expect(clippy::module_name_repetitions, reason = "more readable")]
#[macro_export]
macro_rules! define_kind {
    (
        #[doc = $doc:literal]
        enum $name:ident {
            $(
                #[doc = $variant_doc:literal]
                $variant:ident = $value:literal
            ),+ $(,)?
        }
    ) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            $crate::private::strum::Display,
            $crate::private::strum::EnumString,
            Eq,
            Hash,
            PartialEq,
        )]
        #[cfg_attr(
            feature = "serde",
            derive(
                $crate::private::serde::Deserialize,
                $crate::private::serde::Serialize,
            ),
            serde(rename_all = "SCREAMING_SNAKE_CASE"),
        )]
        #[doc = $doc]
        #[repr(u8)]
        #[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $(
                 #[doc = $variant_doc]
                 $variant = $value,
            )+
        }

        impl $name {
            /// All the variants in their declaration order.
            pub const ALL: [Self; [$($value),+].len()] = [$(Self::$variant),+];

            /// Converts this into its [`u8`] representation.
            #[must_use]
            pub const fn u8(self) -> u8 {
                self as u8
            }

            /// Converts the provided [`u8`] representation back.
            ///
            /// [`None`] is returned if no variant is represented so.
            #[must_use]
            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $( $value => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl<'a> $crate::private::postgres_types::FromSql<'a> for $name {
            $crate::private::postgres_types::accepts!(INT2);

            fn from_sql(
                ty: &$crate::private::postgres_types::Type,
                raw: &[u8],
            ) -> Result<
                $name,
                Box<dyn ::std::error::Error
                    + ::core::marker::Sync
                    + ::core::marker::Send>,
            > {
                let v = u8::try_from(i16::from_sql(ty, raw)?)?;
                Self::from_u8(v).ok_or_else(|| {
                    ::std::format!(
                        "invalid `{}` value: {v}",
                        ::core::stringify!($name),
                    )
                    .into()
                })
            }
        }

        #[cfg(feature = "postgres")]
        impl $crate::private::postgres_types::ToSql for $name {
            $crate::private::postgres_types::accepts!(INT2);
            $crate::private::postgres_types::to_sql_checked!();

            fn to_sql(
                &self,
                ty: &$crate::private::postgres_types::Type,
                w: &mut $crate::private::postgres_types::private::BytesMut,
            ) -> Result<
                $crate::private::postgres_types::IsNull,
                ::std::boxed::Box<
                    dyn ::std::error::Error
                        + ::core::marker::Sync
                        + ::core::marker::Send
                >,
            > {
                i16::from(self.u8()).to_sql(ty, w)
            }
        }
    };
}

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    crate::define_kind! {
        #[doc = "Light colour."]
        enum Light {
            #[doc = "Stop."]
            Red = 1,

            #[doc = "Go."]
            GreenArrow = 3,
        }
    }

    #[test]
    fn converts_u8_both_ways() {
        for light in Light::ALL {
            assert_eq!(Light::from_u8(light.u8()), Some(light));
        }
        assert_eq!(Light::from_u8(2), None);
        assert_eq!(Light::from_u8(0), None);
    }

    #[test]
    fn uses_screaming_snake_case() {
        assert_eq!(Light::GreenArrow.to_string(), "GREEN_ARROW");
        assert_eq!(Light::from_str("RED").unwrap(), Light::Red);
        assert!(Light::from_str("red").is_err());
    }
}
