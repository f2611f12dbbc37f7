use anyhow::{Context, Result};
use tally_core::HouseRegistry;
use tally_ingest::BeneficiaryValidator;
use tally_ledger::CsvWorkbook;

use crate::config::{Config, GroupSection};

/// Everything one configured chat group needs to extract and record payments.
pub struct GroupContext {
    pub group: GroupSection,
    pub registry: HouseRegistry,
    pub workbook: CsvWorkbook,
}

pub fn open_group(cfg: &Config, group_id: i64) -> Result<GroupContext> {
    let group = cfg.group(group_id)?.clone();
    let registry = HouseRegistry::load_json(&group.houses_file)?;
    let workbook = CsvWorkbook::open(&group.ledger_dir)
        .with_context(|| format!("open ledger {}", group.ledger_dir.display()))?;
    tracing::info!(group = group.id, name = %group.name, houses = registry.len(), "group opened");
    Ok(GroupContext {
        group,
        registry,
        workbook,
    })
}

pub fn validator(cfg: &Config) -> Result<BeneficiaryValidator> {
    let v = match &cfg.authorized_tokens {
        Some(tokens) => BeneficiaryValidator::with_tokens(tokens)?,
        None => BeneficiaryValidator::new()?,
    };
    Ok(v)
}
