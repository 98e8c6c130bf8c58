use anyhow::Result;
use chrono::NaiveDate;
use disclosure_parser::*;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn instance(year: i32, total_assets: i64, prior_assets: i64, revenue: Option<i64>) -> String {
    let revenue = revenue
        .map(|value| {
            format!(
                r#"<jppfs_cor:NetSales contextRef="CurrentYearDuration">{}</jppfs_cor:NetSales>"#,
                value
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<xbrli:xbrl xmlns:xbrli="http://www.xbrl.org/2003/instance"
            xmlns:jppfs_cor="http://disclosure.edinet-fsa.go.jp/taxonomy/jppfs/cor"
            xmlns:jpdei_cor="http://disclosure.edinet-fsa.go.jp/taxonomy/jpdei/cor">
  <xbrli:context id="CurrentYearInstant">
    <xbrli:period><xbrli:instant>{year}-03-31</xbrli:instant></xbrli:period>
  </xbrli:context>
  <xbrli:context id="CurrentYearDuration">
    <xbrli:period>
      <xbrli:startDate>{prev}-04-01</xbrli:startDate>
      <xbrli:endDate>{year}-03-31</xbrli:endDate>
    </xbrli:period>
  </xbrli:context>
  <xbrli:context id="Prior1YearInstant">
    <xbrli:period><xbrli:instant>{prev}-03-31</xbrli:instant></xbrli:period>
  </xbrli:context>
  <jpdei_cor:FilerNameInJapaneseDEI contextRef="CurrentYearDuration">サンプル工業株式会社</jpdei_cor:FilerNameInJapaneseDEI>
  <jppfs_cor:TotalAssets contextRef="CurrentYearInstant">{total_assets}</jppfs_cor:TotalAssets>
  <jppfs_cor:TotalAssets contextRef="Prior1YearInstant">{prior_assets}</jppfs_cor:TotalAssets>
  <jppfs_cor:NetCashProvidedByUsedInOperatingActivities contextRef="CurrentYearDuration">300</jppfs_cor:NetCashProvidedByUsedInOperatingActivities>
  <jppfs_cor:NetCashProvidedByUsedInInvestingActivities contextRef="CurrentYearDuration">-120</jppfs_cor:NetCashProvidedByUsedInInvestingActivities>
  {revenue}
</xbrli:xbrl>"#,
        year = year,
        prev = year - 1,
        total_assets = total_assets,
        prior_assets = prior_assets,
        revenue = revenue,
    )
}

fn write_zip(path: &Path, entries: &[(&str, &str)]) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(path)?);
    for (name, body) in entries {
        writer.start_file(*name, SimpleFileOptions::default())?;
        writer.write_all(body.as_bytes())?;
    }
    writer.finish()?;
    Ok(())
}

fn write_edinet_zip(dir: &Path, name: &str, xbrl: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    write_zip(
        &path,
        &[
            ("XBRL/AuditDoc/jpaud-aar-cn-001.xbrl", "<xbrl/>"),
            ("XBRL/PublicDoc/jpcrp030000-asr-001_E00001-000.xbrl", xbrl),
            ("XBRL/PublicDoc/manifest_PublicDoc.xml", "<manifest/>"),
        ],
    )?;
    Ok(path)
}

#[test]
fn test_xbrl_directory_end_to_end() -> Result<()> {
    let input = tempfile::tempdir()?;
    write_edinet_zip(input.path(), "S100AAAA.zip", &instance(2024, 1_000, 900, Some(5_000)))?;
    write_edinet_zip(input.path(), "S100BBBB.zip", &instance(2025, 1_100, 950, None))?;
    std::fs::write(
        input.path().join("manifest.json"),
        r#"{
            "matched_doc_count": 2,
            "results": [
                {
                    "file_path": "raw/S100BBBB.zip",
                    "doc_id": "S100BBBB",
                    "source": "edinet",
                    "endpoint_or_doc_id": "S100BBBB",
                    "fetched_at": "2025-06-30T09:00:00Z"
                }
            ]
        }"#,
    )?;

    let engine = DisclosureEngine::new(EngineConfig::default())?;
    let outcome = engine.parse_directory(input.path(), "7203", None)?;
    assert_eq!(outcome.format, SourceFormat::Xbrl);
    assert!(outcome.failures.is_empty());

    let documents: Vec<&ParsedDocument> = outcome.documents().collect();
    assert_eq!(documents.len(), 2);
    assert_eq!(documents[0].document_id, "S100AAAA");
    assert_eq!(documents[0].company_name.as_deref(), Some("サンプル工業株式会社"));
    assert_eq!(documents[0].provenance, Provenance::default());
    assert_eq!(documents[1].provenance.source.as_deref(), Some("edinet"));
    assert_eq!(
        documents[1].provenance.fetched_at.as_deref(),
        Some("2025-06-30T09:00:00Z")
    );

    let current = documents[0]
        .period(PeriodKey::Date(date(2024, 3, 31)))
        .expect("current period");
    assert_eq!(current.period_type, PeriodType::Mixed);
    assert_eq!(current.value(CanonicalKey::TotalAssets), Some(Amount::Integer(1_000)));
    assert_eq!(current.value(CanonicalKey::FreeCashFlow), Some(Amount::Integer(180)));

    // 2024-03-31 appears in both documents; the earlier document's value is kept
    let index = outcome.period_index();
    let keys: Vec<PeriodKey> = index.iter().map(|entry| entry.period_end).collect();
    assert_eq!(
        keys,
        vec![
            PeriodKey::Date(date(2023, 3, 31)),
            PeriodKey::Date(date(2024, 3, 31)),
            PeriodKey::Date(date(2025, 3, 31)),
        ]
    );
    assert_eq!(
        index[1].statements.get(CanonicalKey::TotalAssets),
        Some(Amount::Integer(1_000))
    );
    assert_eq!(index[1].source_document_ids, vec!["S100AAAA", "S100BBBB"]);
    assert_eq!(
        index[1].statements.get(CanonicalKey::Revenue),
        Some(Amount::Integer(5_000))
    );

    let output = tempfile::tempdir()?;
    let saved = outcome.write(output.path(), "7203")?;
    assert!(saved.contains_key("S100AAAA"));
    assert!(saved.contains_key("financials"));

    let aggregate: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.path().join("financials.json"))?)?;
    assert_eq!(aggregate["ticker"], "7203");
    assert_eq!(aggregate["document_count"], 2);
    assert_eq!(aggregate["source_format"], "xbrl");
    assert!(aggregate["documents"][0]["source_zip"]
        .as_str()
        .map_or(false, |path| path.ends_with("S100AAAA.zip")));
    assert_eq!(aggregate["period_index"][1]["bs"]["total_assets"], 1_000);
    assert_eq!(aggregate["schema"]["bs"][0], "total_assets");

    let per_document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output.path().join("S100BBBB.json"))?)?;
    assert_eq!(per_document["endpoint_or_doc_id"], "S100BBBB");
    assert_eq!(per_document["periods"][1]["period_end"], "2025-03-31");

    Ok(())
}

#[test]
fn test_batch_policy_on_corrupt_archive() -> Result<()> {
    let input = tempfile::tempdir()?;
    write_edinet_zip(input.path(), "S100AAAA.zip", &instance(2024, 1_000, 900, None))?;
    std::fs::write(input.path().join("S100ZZZZ.zip"), b"this is not a zip archive")?;

    let abort = DisclosureEngine::new(EngineConfig::default())?;
    let err = abort
        .parse_xbrl_directory(input.path(), "7203")
        .unwrap_err();
    assert!(matches!(err, DisclosureError::CorruptArchive { .. }));

    let config = EngineConfig::from_json_str(r#"{"batch_policy": "continue"}"#)?;
    let keep_going = DisclosureEngine::new(config)?;
    let outcome = keep_going.parse_xbrl_directory(input.path(), "7203")?;
    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert!(outcome.failures[0].path.ends_with("S100ZZZZ.zip"));
    assert!(matches!(
        outcome.failures[0].error,
        DisclosureError::CorruptArchive { .. }
    ));

    Ok(())
}

#[test]
fn test_xbrl_error_kinds() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = DisclosureEngine::new(EngineConfig::default())?;

    let no_member = dir.path().join("empty.zip");
    write_zip(&no_member, &[("PublicDoc/readme.txt", "no instance here")])?;
    assert!(matches!(
        engine.parse_xbrl_zip(&no_member, "7203"),
        Err(DisclosureError::NoRelevantMember(_))
    ));

    let malformed = write_edinet_zip(dir.path(), "broken.zip", "<xbrli:xbrl><unclosed>")?;
    assert!(matches!(
        engine.parse_xbrl_zip(&malformed, "7203"),
        Err(DisclosureError::MalformedMarkup { .. })
    ));

    assert!(matches!(
        engine.parse_xbrl_zip(&dir.path().join("absent.zip"), "7203"),
        Err(DisclosureError::MissingInput(_))
    ));

    Ok(())
}

fn annual_report_pages() -> TextPages {
    TextPages::new([
        "第一部【企業情報】\n第５【経理の状況】".to_string(),
        [
            "１【連結財務諸表等】",
            "①【連結貸借対照表】",
            "（単位：千円）",
            "科目  前連結会計年度(令和5年3月31日)  当連結会計年度(令和6年3月31日)",
            "流動資産合計  ※１ 4,000  5,000",
            "固定資産合計  6,000  7,000",
            "負債合計  3,000  3,500",
            "純資産合計  7,000  8,500",
        ]
        .join("\n"),
        [
            "②【連結損益計算書及び連結包括利益計算書】",
            "【連結損益計算書】",
            "（単位：千円）",
            "科目  前連結会計年度(自 令和4年4月1日 至 令和5年3月31日)  当連結会計年度(自 令和5年4月1日 至 令和6年3月31日)",
            "売上高  20,000  24,000",
            "営業利益又は営業損失（△）  △500  1,500",
            "親会社株主に帰属する当期純利益又は親会社株主に帰属する当期純損失（△）  (200)  900",
        ]
        .join("\n"),
    ])
}

#[test]
fn test_pdf_pipeline_from_text_pages() -> Result<()> {
    let engine = DisclosureEngine::new(EngineConfig::default())?;
    let parser = PdfReportParser::new(engine.registry(), engine.config());
    let path = Path::new("/reports/7203_有価証券報告書_2024.pdf");

    let (document, metadata) = parser.parse_pages(&annual_report_pages(), path, "7203", None)?;

    assert_eq!(document.document_id, "7203_有価証券報告書_2024");
    assert_eq!(document.company_name, None);
    assert_eq!(document.periods.len(), 2);

    let current = document
        .period(PeriodKey::Date(date(2024, 3, 31)))
        .expect("current period");
    assert_eq!(current.period_type, PeriodType::Mixed);
    assert_eq!(current.period_start, Some(date(2023, 4, 1)));
    assert_eq!(current.value(CanonicalKey::TotalAssets), Some(Amount::Integer(12_000_000)));
    assert_eq!(current.value(CanonicalKey::TotalEquity), Some(Amount::Integer(8_500_000)));
    assert_eq!(current.value(CanonicalKey::NetAssets), None);
    assert_eq!(current.value(CanonicalKey::Revenue), Some(Amount::Integer(24_000_000)));
    assert_eq!(current.value(CanonicalKey::NetIncome), Some(Amount::Integer(900_000)));
    assert_eq!(current.value(CanonicalKey::FreeCashFlow), None);

    let prior = document
        .period(PeriodKey::Date(date(2023, 3, 31)))
        .expect("prior period");
    assert_eq!(prior.value(CanonicalKey::CurrentAssets), Some(Amount::Integer(4_000_000)));
    assert_eq!(prior.value(CanonicalKey::OperatingIncome), Some(Amount::Integer(-500_000)));
    assert_eq!(prior.value(CanonicalKey::NetIncome), Some(Amount::Integer(-200_000)));

    assert_eq!(metadata.extraction_pages, vec![2, 3]);
    assert_eq!(metadata.unit_detected, "千円");
    assert_eq!(metadata.unit_multiplier, 1_000);
    assert_eq!(metadata.period_end, Some(PeriodKey::Date(date(2024, 3, 31))));
    assert!(metadata.concept_score >= 7);

    let output = tempfile::tempdir()?;
    let record = DocumentRecord {
        document,
        pdf_metadata: Some(metadata),
    };
    write_outputs(output.path(), "7203", SourceFormat::Pdf, vec![record])?;

    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(
        output.path().join("7203_有価証券報告書_2024.json"),
    )?)?;
    assert_eq!(written["source_pdf"], "/reports/7203_有価証券報告書_2024.pdf");
    assert_eq!(written["pdf_metadata"]["unit_detected"], "千円");
    assert_eq!(written["pdf_metadata"]["parser_version"], env!("CARGO_PKG_VERSION"));

    Ok(())
}

#[test]
fn test_pdf_directory_requires_matching_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("notes.txt"), "nothing")?;
    let engine = DisclosureEngine::new(EngineConfig::default())?;

    assert!(matches!(
        engine.parse_directory(dir.path(), "7203", Some(InputMode::Pdf)),
        Err(DisclosureError::MissingInput(_))
    ));
    Ok(())
}

#[test]
fn test_detected_mode_without_inputs_is_missing_input() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = DisclosureEngine::new(EngineConfig::default())?;

    assert!(matches!(
        engine.parse_directory(dir.path(), "7203", None),
        Err(DisclosureError::MissingInput(_))
    ));

    std::fs::write(dir.path().join("notes.txt"), "nothing")?;
    assert!(matches!(
        engine.parse_directory(dir.path(), "7203", None),
        Err(DisclosureError::MissingInput(_))
    ));
    Ok(())
}

#[test]
fn test_unreadable_pdf_is_reported_per_document() -> Result<()> {
    let dir = tempfile::tempdir()?;
    std::fs::write(dir.path().join("7203_有価証券報告書_2024.pdf"), b"not really a pdf")?;

    let config = EngineConfig {
        batch_policy: BatchPolicy::Continue,
        ..EngineConfig::default()
    };
    let engine = DisclosureEngine::new(config)?;
    let outcome = engine.parse_directory(dir.path(), "7203", None)?;

    assert_eq!(outcome.format, SourceFormat::Pdf);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].error,
        DisclosureError::UnreadablePdf { .. }
    ));
    Ok(())
}

#[test]
fn test_config_file_and_schema() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("engine.json");
    std::fs::write(&path, r#"{"strategies": ["hybrid"], "max_statement_pages": 4}"#)?;

    let config = EngineConfig::from_path(&path)?;
    assert_eq!(config.strategies, vec![TableStrategy::Hybrid]);
    assert_eq!(config.max_statement_pages, 4);
    assert!(config.half_year_correction);

    let schema = AggregateReport::schema_as_json()?;
    assert!(schema.contains("generated_at"));
    assert!(schema.contains("pdf_metadata"));
    Ok(())
}
