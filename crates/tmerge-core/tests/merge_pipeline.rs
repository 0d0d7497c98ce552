use std::fs;
use std::path::Path;
use tmerge_core::{save_csv, BlockStatus, DirectorySource, MergeEngine, MergePlan, TemplateSchema};

const TEMPLATE: &str = "record_id,redcap_repeat_instrument,redcap_repeat_instance,\
patient_id,sleep_score,complete,\
date_fb,steps,fitbit_complete,\
start_time_fitbit_dc5002,minutes_asleep,fitbit_f530f4_complete,\
date_iq,pm25,aqi,pm1,pm10,temp,humidity,co2,iq_air_complete,\
unused\n";

fn write(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

fn subject_folder(root: &Path) -> std::path::PathBuf {
    let folder = root.join("2024_P017_baseline");
    fs::create_dir_all(&folder).unwrap();
    fs::create_dir_all(root.join("2024_P018_baseline")).unwrap();

    write(&folder, "SIReport_P017_night1.csv", "patient_id,sleep_score\nP017,81\n");
    write(&folder, "SIReport_P017_night2.csv", "patient_id,sleep_score\nP017,77\n");

    let export = [
        "Body",
        "Activities",
        "Date,Steps",
        r#"2024-01-01,"8,204""#,
        r#"2024-01-02,"9,100""#,
        "",
        "Sleep",
        "Start Time,Minutes Asleep",
        r#"2024-01-02 23:10,"412""#,
        r#"2024-01-01 22:45,"398""#,
        "Food Log 20240101",
        "Daily Totals",
    ]
    .join("\n");
    write(&folder, "P017_fitbit_export_202401.csv", &export);

    let header = "Date;Time;PM2_5(ug/m3);AQI(US);PM1(ug/m3);PM10(ug/m3);Temperature(F);Humidity(%RH);CO2(ppm)";
    write(
        &folder,
        "P017_AirVisual_values_a.txt",
        &format!("{header}\n2024-01-01;00:00;4;10;2;6;70;40;400\n2024-01-01;00:05;6;20;3;8;71;42;420\n"),
    );
    write(
        &folder,
        "P017_AirVisual_values_b.txt",
        &format!("{header}\n2024-01-02;00:00;8;30;4;9;69;45;500\n"),
    );

    write(&folder, "notes.txt", "not an input");
    folder
}

fn schema(dir: &Path) -> TemplateSchema {
    let path = dir.join("template.csv");
    fs::write(&path, TEMPLATE).unwrap();
    TemplateSchema::load(&path).unwrap()
}

#[test]
fn test_directory_merge_to_csv() {
    let root = tempfile::tempdir().unwrap();
    subject_folder(root.path());
    let schema = schema(root.path());

    let source = DirectorySource::for_subject(root.path(), "P017").unwrap().unwrap();
    assert!(source.root().ends_with("2024_P017_baseline"));

    let plan = MergePlan::default();
    let export = plan.export.clone();
    let outcome = MergeEngine::new(plan).merge_from("P017", &source, &schema).unwrap();

    // 2 report rows, 2 activity rows, 2 sleep rows, 2 air days
    assert_eq!(outcome.template.row_count(), 8);
    assert!(outcome.report.skipped_files.is_empty());
    assert_eq!(outcome.report.skipped_blocks().count(), 0);
    assert_eq!(
        outcome.report.block("iq_air").map(|b| &b.status),
        Some(&BlockStatus::Appended { first_row: 6, rows: 2 })
    );

    let out = root.path().join("ImportTemplate_P017.csv");
    save_csv(&outcome.template, &out, &export).unwrap();
    let text = fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 9);
    assert!(lines[0].ends_with("co2,iq_air_complete"));
    assert_eq!(lines[1], "P017,sleepimage_ring,1,P017,81,2,,,,,,,,,,,,,,,");
    assert_eq!(lines[3], "P017,fitbit,1,,,,2024-01-01,\"8,204\",2,,,,,,,,,,,,");
    assert_eq!(lines[5], "P017,fitbit_f530f4,1,,,,,,,2024-01-01 22:45,398,2,,,,,,,,,");
    assert_eq!(
        lines[7],
        "P017,iq_air,1,,,,,,,,,,2024-01-01,5.0,15.0,2.5,7.0,70.5,41.0,410.0,2"
    );
}

#[test]
fn test_merge_is_idempotent_across_runs() {
    let root = tempfile::tempdir().unwrap();
    subject_folder(root.path());
    let schema = schema(root.path());
    let source = DirectorySource::for_subject(root.path(), "P017").unwrap().unwrap();
    let engine = MergeEngine::default();

    let first = engine.merge_from("P017", &source, &schema).unwrap();
    let second = engine.merge_from("P017", &source, &schema).unwrap();

    assert_eq!(first.template, second.template);
}

#[test]
fn test_subject_without_files_gives_empty_template() {
    let root = tempfile::tempdir().unwrap();
    subject_folder(root.path());
    let schema = schema(root.path());

    let source = DirectorySource::for_subject(root.path(), "P018").unwrap().unwrap();
    let outcome = MergeEngine::default().merge_from("P018", &source, &schema).unwrap();

    assert_eq!(outcome.template.row_count(), 0);
    assert!(!outcome.report.has_data());

    let mut out = Vec::new();
    tmerge_core::write_csv(&outcome.template, &mut out, &MergePlan::default().export).unwrap();
    assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
}

#[test]
fn test_unknown_subject_folder() {
    let root = tempfile::tempdir().unwrap();
    subject_folder(root.path());

    assert!(DirectorySource::for_subject(root.path(), "P999").unwrap().is_none());
}

#[test]
fn test_stale_plan_column_is_fatal() {
    let root = tempfile::tempdir().unwrap();
    subject_folder(root.path());
    let schema = TemplateSchema::new(["record_id", "redcap_repeat_instrument", "redcap_repeat_instance"]).unwrap();
    let source = DirectorySource::for_subject(root.path(), "P017").unwrap().unwrap();

    let err = MergeEngine::default().merge_from("P017", &source, &schema).unwrap_err();

    assert!(err.is_fatal());
}

#[test]
fn test_same_file_name_in_two_nights_merges_both() {
    let root = tempfile::tempdir().unwrap();
    let schema = schema(root.path());
    for (night, score) in [("night1", 81), ("night2", 77)] {
        let folder = root.path().join("2024_P020_baseline").join(night);
        fs::create_dir_all(&folder).unwrap();
        write(&folder, "SIReport_P020.csv", &format!("patient_id,sleep_score\nP020,{score}\n"));
    }

    let source = DirectorySource::for_subject(root.path(), "P020").unwrap().unwrap();
    let outcome = MergeEngine::default().merge_from("P020", &source, &schema).unwrap();

    assert_eq!(outcome.template.row_count(), 2);
    assert!(outcome.report.skipped_files.is_empty());
    let scores: Vec<String> = (0..2)
        .map(|r| outcome.template.cell(r, "sleep_score").unwrap().to_string_value())
        .collect();
    assert_eq!(scores, vec!["81", "77"]);
}
