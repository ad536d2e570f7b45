// SPDX-License-Identifier: Apache-2.0

//! Identifiers for program variants in a registry.
//!
//! A variant is either the literal `seed` or a mutant named by 16 lowercase
//! hex characters (64 random bits), which also names its directory under
//! `mutants/`.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::EmiError;

pub const SEED: &str = "seed";

/// Number of hex characters in a minted mutant id.
pub const MUTANT_ID_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantId(String);

impl VariantId {
    pub fn seed() -> Self {
        VariantId(SEED.to_string())
    }

    /// Mints a fresh mutant id from the thread-local CSPRNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        VariantId(format!("{:016x}", rng.next_u64()))
    }

    /// Accepts `seed` or exactly [`MUTANT_ID_LEN`] hex digits. Anything else
    /// (including path separators) is rejected so an id can never name a path
    /// outside `mutants/`.
    pub fn parse(s: &str) -> Result<Self, EmiError> {
        if s == SEED {
            return Ok(Self::seed());
        }
        if s.len() == MUTANT_ID_LEN && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(VariantId(s.to_ascii_lowercase()));
        }
        Err(EmiError::InvalidVariantId { id: s.to_string() })
    }

    pub fn is_seed(&self) -> bool {
        self.0 == SEED
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VariantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VariantId {
    type Err = EmiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VariantId::parse(s)
    }
}

impl TryFrom<String> for VariantId {
    type Error = EmiError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        VariantId::parse(&s)
    }
}

impl From<VariantId> for String {
    fn from(id: VariantId) -> Self {
        id.0
    }
}
