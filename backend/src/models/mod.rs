use std::io::Write;

use diesel::deserialize::{self, FromSql};
use diesel::pg::{Pg, PgValue};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};

mod favorite;
mod message;
mod property;
mod review;
mod user;

pub use favorite::*;
pub use message::*;
pub use property::*;
pub use review::*;
pub use user::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum persisted as its display text in a VARCHAR column.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsExpression, FromSqlRow, Serialize, Deserialize)]
        #[diesel(sql_type = Text)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql<Text, Pg> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
                out.write_all(self.as_str().as_bytes())?;
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Pg> for $name {
            fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
                let text = std::str::from_utf8(bytes.as_bytes())?;
                Ok(text.parse()?)
            }
        }
    };
}

text_enum! {
    /// Account role. Realtors own listings, admins see the back office.
    UserType {
        User => "User",
        Realtor => "Realtor",
        Admin => "Admin",
    }
}

text_enum! {
    PriceType {
        Sale => "Sale",
        Rent => "Rent",
    }
}

text_enum! {
    PropertyStatus {
        Available => "Available",
        Sold => "Sold",
        Pending => "Pending",
        Rented => "Rented",
        OffMarket => "Off Market",
    }
}

impl UserType {
    pub fn can_list_properties(self) -> bool {
        matches!(self, UserType::Realtor | UserType::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Available", PropertyStatus::Available)]
    #[case("Off Market", PropertyStatus::OffMarket)]
    #[case("Rented", PropertyStatus::Rented)]
    fn status_parses_display_text(#[case] text: &str, #[case] expected: PropertyStatus) {
        assert_eq!(text.parse::<PropertyStatus>(), Ok(expected));
        assert_eq!(expected.to_string(), text);
    }

    #[test]
    fn unknown_variant_names_the_enum() {
        let err = "Landlord".parse::<UserType>().unwrap_err();
        assert_eq!(err.kind, "UserType");
        assert!(err.to_string().contains("Landlord"));
    }

    #[test]
    fn serde_uses_display_text() {
        let json = serde_json::to_string(&PropertyStatus::OffMarket).unwrap();
        assert_eq!(json, "\"Off Market\"");
        let parsed: PriceType = serde_json::from_str("\"Rent\"").unwrap();
        assert_eq!(parsed, PriceType::Rent);
    }

    #[rstest]
    #[case(UserType::User, false)]
    #[case(UserType::Realtor, true)]
    #[case(UserType::Admin, true)]
    fn only_realtors_and_admins_list(#[case] user_type: UserType, #[case] expected: bool) {
        assert_eq!(user_type.can_list_properties(), expected);
    }
}
