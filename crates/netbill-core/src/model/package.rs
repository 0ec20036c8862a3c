// ── Package domain types ──

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::ids::PackageId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PackageStatus {
    Active,
    Inactive,
}

/// An internet service package. Its name doubles as the router profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub price: Decimal,
    pub bandwidth_label: Option<String>,
    pub description: Option<String>,
    pub status: PackageStatus,
}

#[derive(Debug, Clone)]
pub struct NewPackage {
    pub name: String,
    pub price: Decimal,
    pub bandwidth_label: Option<String>,
    pub description: Option<String>,
    pub status: PackageStatus,
}
