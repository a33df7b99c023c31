//! # sift-cli — command-line client for the log query gateway
//!
//! Drives a running `sift-server` over HTTP and pretty-prints the JSON
//! responses. The base URL comes from `SIFT_BASE_URL` (default
//! `http://127.0.0.1:3100`).

use clap::{Parser, Subcommand};
use serde_json::json;

/// SIFT — query and aggregate structured log records.
#[derive(Parser)]
#[command(name = "sift", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve every record (scroll strategy).
    All,

    /// Retrieve every record (bounded-offset paging).
    Paged,

    /// Records in an inclusive timestamp range.
    FilterTime {
        /// Start instant, `YYYY-MM-DDThh:mm:ss.sssZ`.
        start: String,
        /// End instant, same format.
        end: String,
    },

    /// Records whose field equals one of the given values.
    FilterTerms {
        field: String,
        values: Vec<String>,
        /// Bare terms query sized for wide result sets.
        #[arg(long)]
        dynamic: bool,
    },

    /// Document counts grouped by a field.
    GroupBy {
        field: String,
        #[arg(long)]
        max_buckets: Option<usize>,
    },

    /// Document counts grouped by two fields.
    Nested {
        field1: String,
        field2: String,
        #[arg(long)]
        max_buckets: Option<usize>,
    },

    /// Distinct count of one field per value of another.
    Unique {
        group: String,
        unique: String,
        #[arg(long)]
        max_buckets: Option<usize>,
    },

    /// Per-source hourly histogram of distinct dates.
    HourlySources,

    /// Approximate distinct count of a field.
    Cardinality { field: String },

    /// Return only the given fields per record.
    Project {
        fields: Vec<String>,
        /// Legacy synthetic row numbering instead of backend ids.
        #[arg(long)]
        synthetic_ids: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base_url =
        std::env::var("SIFT_BASE_URL").unwrap_or_else(|_| "http://127.0.0.1:3100".to_string());

    let result = match cli.command {
        Commands::All => get(&client, &format!("{base_url}/api/logs?mode=scroll")).await,
        Commands::Paged => get(&client, &format!("{base_url}/api/logs?mode=paged")).await,

        Commands::FilterTime { start, end } => {
            let url = format!(
                "{base_url}/api/logs/filter/time?start={}&end={}",
                urlencode(&start),
                urlencode(&end)
            );
            get(&client, &url).await
        }

        Commands::FilterTerms {
            field,
            values,
            dynamic,
        } => {
            let payload = json!({ "field": field, "values": values, "dynamic": dynamic });
            post(&client, &format!("{base_url}/api/logs/filter/terms"), &payload).await
        }

        Commands::GroupBy { field, max_buckets } => {
            let url = with_bucket_cap(
                format!("{base_url}/api/aggs/group-by/{field}"),
                max_buckets,
            );
            get(&client, &url).await
        }

        Commands::Nested {
            field1,
            field2,
            max_buckets,
        } => {
            let url = with_bucket_cap(
                format!("{base_url}/api/aggs/nested?field1={field1}&field2={field2}"),
                max_buckets,
            );
            get(&client, &url).await
        }

        Commands::Unique {
            group,
            unique,
            max_buckets,
        } => {
            let url = with_bucket_cap(
                format!("{base_url}/api/aggs/unique?group={group}&unique={unique}"),
                max_buckets,
            );
            get(&client, &url).await
        }

        Commands::HourlySources => {
            get(&client, &format!("{base_url}/api/aggs/hourly-sources")).await
        }

        Commands::Cardinality { field } => {
            get(&client, &format!("{base_url}/api/aggs/cardinality/{field}")).await
        }

        Commands::Project {
            fields,
            synthetic_ids,
        } => {
            let payload = json!({ "fields": fields, "synthetic_ids": synthetic_ids });
            post(&client, &format!("{base_url}/api/project"), &payload).await
        }
    };

    match result {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value).unwrap_or_default()),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn get(client: &reqwest::Client, url: &str) -> Result<serde_json::Value, String> {
    let response = client.get(url).send().await.map_err(|e| e.to_string())?;
    decode(response).await
}

async fn post(
    client: &reqwest::Client,
    url: &str,
    payload: &serde_json::Value,
) -> Result<serde_json::Value, String> {
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .map_err(|e| e.to_string())?;
    decode(response).await
}

async fn decode(response: reqwest::Response) -> Result<serde_json::Value, String> {
    let status = response.status();
    let value: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
    if status.is_success() {
        Ok(value)
    } else {
        Err(format!("{status}: {value}"))
    }
}

fn with_bucket_cap(mut url: String, max_buckets: Option<usize>) -> String {
    if let Some(cap) = max_buckets {
        let sep = if url.contains('?') { '&' } else { '?' };
        url.push(sep);
        url.push_str(&format!("max_buckets={cap}"));
    }
    url
}

// Minimal query-string escaping for the timestamp arguments (':' and '+'
// are the only reserved characters our formats produce).
fn urlencode(raw: &str) -> String {
    raw.replace('+', "%2B").replace(':', "%3A")
}
