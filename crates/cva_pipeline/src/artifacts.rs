//! Artifact rendering.
//!
//! Two byte payloads are published per completed run, both keyed by the run
//! id: a headerless CSV of per-counterparty totals, and a tabular payload
//! joining each total with its CDS reference fields.

use std::collections::HashMap;

use cva_core::CdsRecord;

use crate::aggregate::CounterpartyAggregate;

/// Renders the CSV artifact: `counterparty,shortname,cva` rows sorted by
/// counterparty code, no header.
pub fn render_csv(totals: &[CounterpartyAggregate]) -> Result<Vec<u8>, csv::Error> {
    let mut sorted: Vec<&CounterpartyAggregate> = totals.iter().collect();
    sorted.sort_by(|a, b| a.counterparty.cmp(&b.counterparty));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    for total in sorted {
        writer.write_record([
            total.counterparty.as_str(),
            total.shortname.as_str(),
            &total.cva.to_string(),
        ])?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// Renders the tabular artifact: a header row, then one row per counterparty
/// joining the CVA total with the CDS reference fields, sorted by
/// counterparty code. A counterparty without a CDS record gets empty
/// reference columns.
pub fn render_table(
    totals: &[CounterpartyAggregate],
    cds_by_ticker: &HashMap<String, CdsRecord>,
) -> Result<Vec<u8>, csv::Error> {
    let mut sorted: Vec<&CounterpartyAggregate> = totals.iter().collect();
    sorted.sort_by(|a, b| a.counterparty.cmp(&b.counterparty));

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(["CounterParty Code", "CVA", "Name", "Date", "Red Code", "Tier"])?;
    for total in sorted {
        let cds = cds_by_ticker.get(&total.counterparty);
        writer.write_record([
            total.counterparty.as_str(),
            &total.cva.to_string(),
            total.shortname.as_str(),
            cds.map_or("", |c| c.date.as_str()),
            cds.map_or("", |c| c.redcode.as_str()),
            cds.map_or("", |c| c.tier.as_str()),
        ])?;
    }
    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}
