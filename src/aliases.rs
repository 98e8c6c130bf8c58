use crate::error::{DisclosureError, Result};
use crate::schema::{CanonicalKey, Statement};
use std::collections::HashMap;

pub type AliasTable = [(CanonicalKey, &'static [&'static str])];

/// XBRL local-name aliases, already in normalized identifier form.
/// Each key's own name is added during the build.
pub const XBRL_ALIASES: &AliasTable = &[
    (CanonicalKey::TotalAssets, &["totalassets", "assetstotal"]),
    (CanonicalKey::CurrentAssets, &["currentassets"]),
    (CanonicalKey::NoncurrentAssets, &["noncurrentassets", "fixedassets"]),
    (CanonicalKey::TotalLiabilities, &["totalliabilities", "liabilitiestotal"]),
    (CanonicalKey::CurrentLiabilities, &["currentliabilities"]),
    (
        CanonicalKey::TotalEquity,
        &[
            "totalequity",
            "shareholdersequity",
            "equityattributabletoownersofparent",
        ],
    ),
    (CanonicalKey::NetAssets, &["netassets"]),
    (
        CanonicalKey::Revenue,
        &["netsales", "sales", "revenue", "operatingrevenue"],
    ),
    (CanonicalKey::GrossProfit, &["grossprofit"]),
    (
        CanonicalKey::OperatingIncome,
        &["operatingincome", "operatingincomeloss"],
    ),
    (
        CanonicalKey::OrdinaryIncome,
        &["ordinaryincome", "ordinaryincomeloss"],
    ),
    (
        CanonicalKey::NetIncome,
        &[
            "profitloss",
            "netincome",
            "incomeloss",
            "profitattributabletoownersofparent",
        ],
    ),
    (
        CanonicalKey::OperatingCf,
        &["netcashprovidedbyusedinoperatingactivities"],
    ),
    (
        CanonicalKey::InvestingCf,
        &["netcashprovidedbyusedininvestingactivities"],
    ),
    (
        CanonicalKey::FinancingCf,
        &["netcashprovidedbyusedinfinancingactivities"],
    ),
];

/// Japanese row labels as printed in securities report tables.
pub const LABEL_ALIASES: &AliasTable = &[
    (CanonicalKey::TotalAssets, &["資産合計", "総資産", "総資産額"]),
    (CanonicalKey::CurrentAssets, &["流動資産合計"]),
    (CanonicalKey::NoncurrentAssets, &["固定資産合計", "非流動資産合計"]),
    (CanonicalKey::TotalLiabilities, &["負債合計", "負債の部合計"]),
    (CanonicalKey::CurrentLiabilities, &["流動負債合計"]),
    (CanonicalKey::TotalEquity, &["純資産合計", "純資産の部合計"]),
    (CanonicalKey::Revenue, &["売上高", "営業収益"]),
    (CanonicalKey::GrossProfit, &["売上総利益"]),
    (CanonicalKey::OperatingIncome, &["営業利益"]),
    (CanonicalKey::OrdinaryIncome, &["経常利益"]),
    (
        CanonicalKey::NetIncome,
        &[
            "親会社株主に帰属する当期純利益",
            "親会社株主に帰属する当期純損失",
            "親会社株主に帰属する四半期純利益",
            "親会社株主に帰属する四半期純損失",
            "親会社株主に帰属する中間純利益",
            "親会社株主に帰属する中間純損失",
            "当期純利益",
            "当期純損失",
            "四半期純利益",
            "四半期純損失",
            "中間純利益",
            "中間純損失",
        ],
    ),
    (CanonicalKey::OperatingCf, &["営業活動によるキャッシュ・フロー"]),
    (CanonicalKey::InvestingCf, &["投資活動によるキャッシュ・フロー"]),
    (CanonicalKey::FinancingCf, &["財務活動によるキャッシュ・フロー"]),
];

/// DEI concepts whose first non-empty value names the filer.
pub const COMPANY_NAME_CONCEPTS: [&str; 4] = [
    "filernameinjapanesedei",
    "companynamecoverpage",
    "entitycurrentlegalorregisteredname",
    "filernameinenglishdei",
];

/// Lower-cases and drops everything outside `[0-9a-z]`.
pub fn normalize_identifier(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

pub fn is_company_name_concept(local_name: &str) -> bool {
    let normalized = normalize_identifier(local_name);
    COMPANY_NAME_CONCEPTS.contains(&normalized.as_str())
}

/// Immutable alias lookup, built once and shared by reference with every
/// extraction call.
#[derive(Debug, Clone)]
pub struct ConceptAliasRegistry {
    identifiers: HashMap<String, CanonicalKey>,
    labels: HashMap<String, CanonicalKey>,
    /// Non-BS labels eligible for prefix matching, longest first.
    prefix_labels: Vec<(String, CanonicalKey)>,
}

impl ConceptAliasRegistry {
    pub fn standard() -> Result<Self> {
        Self::build(XBRL_ALIASES, LABEL_ALIASES)
    }

    /// Builds the registry, failing if two canonical keys claim the same
    /// normalized alias.
    pub fn build(identifier_aliases: &AliasTable, label_aliases: &AliasTable) -> Result<Self> {
        let mut identifiers = HashMap::new();
        for &(key, aliases) in identifier_aliases {
            reject_derived(key)?;
            let own_name = normalize_identifier(key.as_str());
            for alias in aliases
                .iter()
                .map(|a| normalize_identifier(a))
                .chain(std::iter::once(own_name))
            {
                insert_alias(&mut identifiers, alias, key)?;
            }
        }

        let mut labels = HashMap::new();
        for &(key, aliases) in label_aliases {
            reject_derived(key)?;
            for alias in aliases {
                insert_alias(&mut labels, alias.trim().to_string(), key)?;
            }
        }

        let mut prefix_labels: Vec<(String, CanonicalKey)> = labels
            .iter()
            .filter(|(_, key)| key.statement() != Statement::Bs)
            .map(|(alias, key)| (alias.clone(), *key))
            .collect();
        prefix_labels.sort_by(|a, b| {
            b.0.chars()
                .count()
                .cmp(&a.0.chars().count())
                .then_with(|| a.0.cmp(&b.0))
        });

        Ok(Self {
            identifiers,
            labels,
            prefix_labels,
        })
    }

    /// Maps an XBRL element local name such as `NetSales` or
    /// `jppfs_cor:TotalAssets` (after prefix removal) to its canonical key.
    pub fn canonicalize_identifier(&self, local_name: &str) -> Option<CanonicalKey> {
        self.identifiers.get(&normalize_identifier(local_name)).copied()
    }

    /// Maps a printed table label. BS labels only match exactly so that a
    /// longer unrelated row cannot borrow a balance-sheet total.
    pub fn map_label(&self, label: &str) -> Option<CanonicalKey> {
        let cleaned = label.trim();
        if cleaned.is_empty() {
            return None;
        }
        if let Some(key) = self.labels.get(cleaned) {
            return Some(*key);
        }
        self.prefix_labels
            .iter()
            .find(|(alias, _)| cleaned.starts_with(alias.as_str()))
            .map(|(_, key)| *key)
    }

    /// Label lookup first, then the identifier form for romanized labels.
    pub fn map_concept(&self, raw: &str) -> Option<CanonicalKey> {
        self.map_label(raw)
            .or_else(|| self.canonicalize_identifier(raw))
    }
}

fn reject_derived(key: CanonicalKey) -> Result<()> {
    if key.is_derived() {
        return Err(DisclosureError::Configuration(format!(
            "{} is derived and cannot carry aliases",
            key
        )));
    }
    Ok(())
}

fn insert_alias(
    lookup: &mut HashMap<String, CanonicalKey>,
    alias: String,
    key: CanonicalKey,
) -> Result<()> {
    if alias.is_empty() {
        return Err(DisclosureError::Configuration(format!(
            "empty alias for {}",
            key
        )));
    }
    match lookup.get(&alias) {
        Some(existing) if *existing != key => Err(DisclosureError::Configuration(format!(
            "Alias collision detected: {} claimed by {} and {}",
            alias, existing, key
        ))),
        _ => {
            lookup.insert(alias, key);
            Ok(())
        }
    }
}
