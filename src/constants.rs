/// Step names used as node identifiers in the dependency graph
pub const STEP_VALIDATE_MOVIES: &str = "validate_movies";
pub const STEP_VALIDATE_CREDITS: &str = "validate_credits";
pub const STEP_MERGE: &str = "merge";
pub const STEP_LOAD: &str = "load";
pub const STEP_ANALYZE: &str = "analyze";
pub const STEP_CLEANUP: &str = "cleanup";

// Default input file names inside the raw directory
pub const MOVIES_INPUT_FILE: &str = "tmdb_5000_movies.csv";
pub const CREDITS_INPUT_FILE: &str = "tmdb_5000_credits.csv";

// Intermediate and output artifact file names
pub const MOVIES_BRONZE_FILE: &str = "movies.csv";
pub const CREDITS_BRONZE_FILE: &str = "credits.csv";
pub const MERGED_SILVER_FILE: &str = "movies_merged.csv";
pub const REPORT_FILE: &str = "top_genres_by_rating.csv";

// Join keys
pub const MOVIE_ID_COLUMN: &str = "id";
pub const CREDITS_ID_COLUMN: &str = "movie_id";

pub const DEFAULT_TABLE: &str = "movies_final";

/// Columns of the persisted table, in insert order
pub const TABLE_COLUMNS: [&str; 9] = [
    "id",
    "title",
    "release_date",
    "vote_average",
    "vote_count",
    "popularity",
    "runtime",
    "genres",
    "cast_top3",
];

/// Header of the aggregate report
pub const REPORT_HEADER: [&str; 3] = ["genre", "n_movies", "avg_vote"];

/// Delimiter used for flattened list fields (genres, cast)
pub const LIST_DELIMITER: &str = ",";

pub const DEFAULT_CAST_TOP_N: usize = 3;

/// Scheme prefix for table artifact references
pub const SQLITE_SCHEME: &str = "sqlite://";
