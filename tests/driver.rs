use anyhow::Result;
use ironbasket::driver::{self, FINAL_OUTPUT, FREQUENT_LIST, RULE_MINING_OUTPUT, SUMMARY_FILE};
use ironbasket::testing::{sample_baskets, write_baskets};
use ironbasket::{FileStateStore, MiningConfig, MiningError};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn lines(path: &Path) -> Result<Vec<String>> {
    Ok(fs::read_to_string(path)?.lines().map(String::from).collect())
}

/// Input directory with the sample baskets and a job marker file.
fn grocery_job() -> Result<(TempDir, MiningConfig)> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("input");
    write_baskets(&input.join("part-00000"), &sample_baskets())?;
    fs::write(input.join("_SUCCESS"), "")?;
    let config =
        MiningConfig::new(input, dir.path().join("out"), 0.4, 0.7).with_transaction_count(7);
    Ok((dir, config))
}

#[test]
fn grocery_run_writes_every_report() -> Result<()> {
    let (_dir, config) = grocery_job()?;
    let summary = driver::run(&config, &config.runner(), &FileStateStore::new())?;

    assert_eq!(summary.records_read, 7);
    assert_eq!(summary.min_support_count, 3);
    assert_eq!(summary.passes, 3);
    assert_eq!(summary.frequent_per_pass, vec![4, 4, 0]);
    assert_eq!(summary.rules_mined, 6);
    assert_eq!(summary.rules_kept, 6);

    let out = &config.output_path;
    for pass in 1..=3 {
        assert!(driver::pass_output_path(out, pass).exists(), "pass {pass}");
    }
    assert_eq!(
        lines(&driver::pass_output_path(out, 2))?,
        vec!["bread,milk\t4", "beer,diapers\t3", "bread,diapers\t3", "diapers,milk\t3"]
    );

    let freq = lines(&out.join(FREQUENT_LIST))?;
    assert_eq!(freq.len(), 8);
    assert_eq!(&freq[..4], ["bread\t5", "milk\t5", "bread,milk\t4", "diapers\t4"]);

    let mined = lines(&out.join(RULE_MINING_OUTPUT))?;
    assert_eq!(mined.len(), 6);
    assert_eq!(mined[0], "[beer] => diapers\t(0.428571, 1.000000, 1.750000)");

    let report = lines(&out.join(FINAL_OUTPUT))?;
    assert_eq!(report.len(), 8);
    assert!(report[0].contains("ASSOCIATION RULE"));
    assert_eq!(
        report.iter().filter(|l| l.contains("ASSOCIATION RULE")).count(),
        1
    );
    assert!(report[1].is_empty());
    assert!(report[2].starts_with(" [diapers] => beer"));

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(out.join(SUMMARY_FILE))?)?;
    assert_eq!(json["passes"], 3);
    assert_eq!(json["rules_kept"], 6);
    assert!(json.get("frequent").is_none());

    assert!(config.state_path().exists());
    Ok(())
}

#[test]
fn reports_do_not_depend_on_partitioning() -> Result<()> {
    let (_dir, mut config) = grocery_job()?;
    config.partitions = Some(1);
    config.threads = Some(1);
    driver::run(&config, &config.runner(), &FileStateStore::new())?;
    let single = lines(&config.output_path.join(FINAL_OUTPUT))?;

    let (_other, mut config) = grocery_job()?;
    config.partitions = Some(7);
    driver::run(&config, &config.runner(), &FileStateStore::new())?;
    assert_eq!(lines(&config.output_path.join(FINAL_OUTPUT))?, single);
    Ok(())
}

#[test]
fn transaction_count_defaults_to_records_read() -> Result<()> {
    let (_dir, mut config) = grocery_job()?;
    config.transaction_count = None;
    let summary = driver::run(&config, &config.runner(), &FileStateStore::new())?;
    assert_eq!(summary.transaction_count, 7);
    assert_eq!(summary.min_support_count, 3);
    assert_eq!(summary.rules_kept, 6);
    Ok(())
}

#[test]
fn empty_input_without_a_count_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("empty.txt");
    fs::write(&input, "")?;
    let config = MiningConfig::new(input, dir.path().join("out"), 0.4, 0.7);
    let err = driver::run(&config, &config.runner(), &FileStateStore::new()).unwrap_err();
    assert!(matches!(err, MiningError::Configuration(_)));
    Ok(())
}

#[test]
fn invalid_config_writes_nothing() -> Result<()> {
    let (_dir, mut config) = grocery_job()?;
    config.min_support = 1.5;
    let err = driver::run(&config, &config.runner(), &FileStateStore::new()).unwrap_err();
    assert!(matches!(err, MiningError::Configuration(_)));
    assert!(!config.output_path.join(FINAL_OUTPUT).exists());
    Ok(())
}

#[test]
fn single_pass_leaves_a_header_only_report() -> Result<()> {
    let (_dir, mut config) = grocery_job()?;
    config.max_pass = 1;
    let summary = driver::run(&config, &config.runner(), &FileStateStore::new())?;
    assert_eq!(summary.passes, 1);
    assert_eq!(summary.rules_kept, 0);

    let report = lines(&config.output_path.join(FINAL_OUTPUT))?;
    assert_eq!(report.len(), 2);
    assert!(!config.output_path.join("output-pass-2").exists());
    Ok(())
}

#[test]
fn config_file_with_custom_delimiter() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let input = dir.path().join("baskets.txt");
    fs::write(&input, "tea|scone\ntea|scone|jam\ntea\ncoffee|scone\n")?;
    let config_path = dir.path().join("job.json");
    let job = serde_json::json!({
        "input_path": input,
        "output_path": dir.path().join("out"),
        "min_support": 0.5,
        "min_confidence": 0.6,
        "transaction_count": 4,
        "item_delimiter": "|",
        "lift_filter": true,
    });
    fs::write(&config_path, serde_json::to_string_pretty(&job)?)?;

    let config = MiningConfig::from_json_file(&config_path)?;
    assert_eq!(config.max_pass, 10);
    let summary = driver::run(&config, &config.runner(), &FileStateStore::new())?;

    // tea 3, scone 3, tea+scone 2: confidences 2/3 but lift 8/9.
    assert_eq!(summary.frequent_itemsets, 3);
    assert_eq!(summary.rules_mined, 0);
    Ok(())
}

#[test]
fn unknown_config_fields_are_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("job.json");
    fs::write(
        &path,
        r#"{"input_path":"in","output_path":"out","min_support":0.1,"min_confidence":0.5,"transaction_count":3,"min_lift":2}"#,
    )?;
    let err = MiningConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, MiningError::Configuration(_)));
    Ok(())
}
