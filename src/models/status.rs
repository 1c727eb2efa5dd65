use std::fmt::{Display, Formatter, Result};

use serde::{Deserialize, Serialize};

/// What the transport does with a record once its batch is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Ack,
    Requeue,
}

impl Display for Disposition {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        match self {
            Disposition::Ack => write!(f, "ack"),
            Disposition::Requeue => write!(f, "requeue"),
        }
    }
}
