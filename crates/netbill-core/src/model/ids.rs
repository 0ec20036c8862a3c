// ── Record identifiers ──
//
// Each record kind gets its own numeric id type so a bill id can never be
// passed where a subscriber id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().trim_start_matches('#').parse().map(Self)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

record_id!(
    /// Identifier of a [`Subscriber`](super::Subscriber).
    SubscriberId
);
record_id!(
    /// Identifier of a [`Package`](super::Package).
    PackageId
);
record_id!(
    /// Identifier of a [`Bill`](super::Bill).
    BillId
);
record_id!(
    /// Identifier of a [`Payment`](super::Payment).
    PaymentId
);
record_id!(
    /// Identifier of a [`RouterConfig`](super::RouterConfig).
    RouterConfigId
);
