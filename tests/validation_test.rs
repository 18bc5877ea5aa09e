use anyhow::Result;
use std::collections::HashSet;
use std::fs;
use tempfile::tempdir;
use tmdb_pipeline::pipeline::artifacts::read_records;
use tmdb_pipeline::pipeline::processing::{validate_dataset, CreditCleaner, MovieCleaner};
use tmdb_pipeline::types::{CleanCredit, CleanMovie};

#[test]
fn test_movies_export_with_nested_lists() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("movies.csv");
    let mut writer = csv::Writer::from_path(&input)?;
    writer.write_record([
        "budget",
        "genres",
        "id",
        "popularity",
        "release_date",
        "runtime",
        "title",
        "vote_average",
        "vote_count",
    ])?;
    writer.write_record([
        "237000000",
        concat!(
            r#"[{"id": 28, "name": "Action"}, {"id": 12, "name": "Adventure"}, "#,
            r#"{"id": 14, "name": "Fantasy"}]"#
        ),
        "19995",
        "150.437577",
        "2009-12-10",
        "162",
        "Avatar",
        "7.2",
        "11800",
    ])?;
    writer.write_record(["0", "[]", "19995", "1", "2010-01-01", "90", "Avatar again", "5", "1"])?;
    let drama = r#"[{'id': 18, 'name': 'Drama'}]"#;
    writer.write_record(["0", drama, "abc", "1", "", "", "Bad id", "5", "1"])?;
    writer.write_record(["0", "", "", "1", "", "", "No id", "5", "1"])?;
    writer.write_record(["0", drama, "7.0", "n/a", "2001-02-30", "-5", "Seven", "", "3"])?;
    writer.flush()?;

    let (artifact, stats) =
        validate_dataset(&MovieCleaner, &input, &temp_dir.path().join("bronze"))?;
    assert_eq!(stats.rows_read, 5);
    assert_eq!(stats.rows_kept, 2);
    assert_eq!(stats.duplicate_id, 1);
    assert_eq!(stats.invalid_id, 1);
    assert_eq!(stats.missing_id, 1);
    assert_eq!(stats.rows_kept + stats.rows_dropped(), stats.rows_read);

    let movies: Vec<CleanMovie> = read_records(&artifact, &["id"])?;
    let ids: HashSet<i64> = movies.iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), movies.len());

    let avatar = movies.iter().find(|m| m.id == 19995).unwrap();
    assert_eq!(avatar.title.as_deref(), Some("Avatar"));
    assert_eq!(avatar.genres.as_deref(), Some("Action,Adventure,Fantasy"));

    let seven = movies.iter().find(|m| m.id == 7).unwrap();
    assert_eq!(seven.genres.as_deref(), Some("Drama"));
    assert_eq!(seven.popularity, None);
    assert_eq!(seven.runtime, None);
    assert_eq!(seven.release_date, None);
    assert_eq!(seven.vote_average, None);
    Ok(())
}

#[test]
fn test_credits_keep_first_three_cast_names() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("credits.csv");
    let mut writer = csv::Writer::from_path(&input)?;
    writer.write_record(["movie_id", "title", "cast", "crew"])?;
    writer.write_record([
        "19995",
        "Avatar",
        concat!(
            r#"[{"cast_id": 242, "character": "Jake", "name": "Sam Worthington", "order": 0}, "#,
            r#"{"cast_id": 3, "character": "Neytiri", "name": "Zoe Saldana", "order": 1}, "#,
            r#"{"cast_id": 25, "character": "Grace", "name": "Sigourney Weaver", "order": 2}, "#,
            r#"{"cast_id": 4, "character": "Quaritch", "name": "Stephen Lang", "order": 3}]"#
        ),
        "[]",
    ])?;
    writer.write_record(["285", "Pirates", "[]", "[]"])?;
    writer.flush()?;

    let (artifact, stats) = validate_dataset(
        &CreditCleaner { cast_top_n: 3 },
        &input,
        &temp_dir.path().join("bronze"),
    )?;
    assert_eq!(stats.rows_kept, 2);

    let credits: Vec<CleanCredit> = read_records(&artifact, &["movie_id"])?;
    assert_eq!(
        credits[0].cast_top3.as_deref(),
        Some("Sam Worthington,Zoe Saldana,Sigourney Weaver")
    );
    assert_eq!(credits[1].cast_top3, None);
    Ok(())
}

#[test]
fn test_empty_input_writes_header_only_artifact() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("movies.csv");
    fs::write(&input, "id,title,genres\n")?;

    let (artifact, stats) =
        validate_dataset(&MovieCleaner, &input, &temp_dir.path().join("bronze"))?;
    assert_eq!(stats.rows_read, 0);
    let movies: Vec<CleanMovie> = read_records(&artifact, &["id"])?;
    assert!(movies.is_empty());
    Ok(())
}

#[test]
fn test_malformed_rows_are_dropped_and_counted() -> Result<()> {
    let temp_dir = tempdir()?;
    let input = temp_dir.path().join("movies.csv");
    let mut content = b"id,title,genres\n1,Alpha,Drama\n2,Too,Many,Fields\n3\n".to_vec();
    content.extend_from_slice(b"4,Bad \xff\xfe bytes,Drama\n5,Omega,Comedy\n");
    fs::write(&input, content)?;

    let (artifact, stats) =
        validate_dataset(&MovieCleaner, &input, &temp_dir.path().join("bronze"))?;
    assert_eq!(stats.rows_read, 5);
    assert_eq!(stats.malformed_rows, 3);
    assert_eq!(stats.rows_kept, 2);
    assert_eq!(stats.rows_kept + stats.rows_dropped(), stats.rows_read);

    let movies: Vec<CleanMovie> = read_records(&artifact, &["id"])?;
    let ids: Vec<i64> = movies.iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![1, 5]);
    Ok(())
}
