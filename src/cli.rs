use std::error::Error;
use std::io::{self, BufRead, Write};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use atty::Stream;
use clap::{Args, Parser, Subcommand};
use menusearch::client::QueryClient;
use menusearch::ranking::{DishHit, RestaurantHit};
use menusearch::server::{self, DEFAULT_POOL_SIZE, DEFAULT_PORT, ServerConfig};
use menusearch::{
    ConfigError, EngineConfig, Location, Ordering, RankPolicy, Response, ResultRecord, Rule,
    Schema, UnknownWordPolicy,
};
use serde_json::json;
use tokio::runtime::Runtime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "menusearch", about = "Fuzzy search over restaurant menus", version)]
pub struct Cli {
    /// Emit JSON instead of human-readable tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the index and serve queries over TCP.
    Serve {
        #[command(flatten)]
        index: IndexArgs,
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Connections handled concurrently.
        #[arg(short = 's', long, default_value_t = DEFAULT_POOL_SIZE)]
        pool_size: usize,
        /// Per-connection read/write timeout in seconds.
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Send each line of stdin as a query to a running server.
    Client {
        #[arg(long, default_value = "localhost")]
        host: String,
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Latitude used for location ordering.
        #[arg(long, default_value_t = 43.45663, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude used for location ordering.
        #[arg(long, default_value_t = 42.253534, allow_negative_numbers = true)]
        lon: f64,
        /// Name reported to the server.
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        order: OrderArgs,
    },
    /// Run each line of stdin as a query against a locally built index.
    Test {
        #[command(flatten)]
        index: IndexArgs,
        #[command(flatten)]
        order: OrderArgs,
        #[arg(long, allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, allow_negative_numbers = true)]
        lon: Option<f64>,
        /// Group matches per restaurant, combining ranks with this policy.
        #[arg(long)]
        group: Option<RankPolicy>,
    },
}

/// Where the index comes from. Flags override the `--config` file.
#[derive(Args, Debug)]
struct IndexArgs {
    /// JSON engine configuration.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    dataset: Option<PathBuf>,
    #[arg(long)]
    stop_words: Option<PathBuf>,
    /// Dataset layout: english or russian.
    #[arg(long)]
    schema: Option<Schema>,
    /// Dataset field separator.
    #[arg(long)]
    separator: Option<String>,
    /// Drop words attached to fewer dishes than this.
    #[arg(long)]
    min_occurrences: Option<usize>,
    /// Spell-correction radius in edits.
    #[arg(long, allow_negative_numbers = true)]
    radius: Option<i64>,
    #[arg(long)]
    rank_policy: Option<RankPolicy>,
    /// What to do with uncorrectable words: fail or skip.
    #[arg(long)]
    unknown_words: Option<UnknownWordPolicy>,
}

impl IndexArgs {
    fn resolve(self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::load(path)?,
            None => EngineConfig::default(),
        };
        if let Some(dataset) = self.dataset {
            config.dataset = dataset;
        }
        if let Some(stop_words) = self.stop_words {
            config.stop_words = stop_words;
        }
        if let Some(schema) = self.schema {
            config.schema = schema;
        }
        if let Some(separator) = self.separator {
            config.separator = separator;
        }
        if let Some(min_occurrences) = self.min_occurrences {
            config.min_occurrences = min_occurrences;
        }
        if let Some(radius) = self.radius {
            config.correction_radius = radius;
        }
        if let Some(policy) = self.rank_policy {
            config.rank_policy = policy;
        }
        if let Some(policy) = self.unknown_words {
            config.unknown_words = policy;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug)]
struct OrderArgs {
    /// by_rank, by_price or by_location.
    #[arg(short, long, default_value = "by_rank")]
    order: Ordering,
    /// normal or reversed.
    #[arg(short, long, default_value = "normal")]
    rule: Rule,
    /// Maximum number of results.
    #[arg(short, long)]
    limit: Option<usize>,
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing();
    match cli.command {
        Command::Serve {
            index,
            host,
            port,
            pool_size,
            timeout_secs,
        } => handle_serve(
            index,
            ServerConfig {
                addr: SocketAddr::new(host, port),
                pool_size,
                io_timeout: Duration::from_secs(timeout_secs),
            },
        ),
        Command::Client {
            host,
            port,
            lat,
            lon,
            name,
            order,
        } => {
            let mut client = QueryClient::new(format!("{host}:{port}"), Location::new(lat, lon));
            if let Some(name) = name {
                client = client.with_name(name);
            }
            handle_client(client, order, cli.json)
        }
        Command::Test {
            index,
            order,
            lat,
            lon,
            group,
        } => {
            let origin = match (lat, lon) {
                (Some(lat), Some(lon)) => Location::new(lat, lon),
                _ => Location::NONE,
            };
            handle_test(index, order, origin, group, cli.json)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn handle_serve(index: IndexArgs, config: ServerConfig) -> Result<(), Box<dyn Error>> {
    let engine = Arc::new(index.resolve()?.build_engine()?);
    let runtime = Runtime::new()?;
    runtime.block_on(server::serve(engine, config))?;
    Ok(())
}

fn handle_client(
    client: QueryClient,
    order: OrderArgs,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let runtime = Runtime::new()?;
    for_each_query(|query| {
        let response =
            runtime.block_on(client.query(query, order.order, order.rule, order.limit))?;
        print_response(query, &response, as_json)
    })
}

fn handle_test(
    index: IndexArgs,
    order: OrderArgs,
    origin: Location,
    group: Option<RankPolicy>,
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    let mut engine = index.resolve()?.build_engine()?;
    if let Some(policy) = group {
        engine = engine.with_rank_policy(policy);
    }
    let limit = menusearch::engine::clamp_limit(order.limit);

    for_each_query(|query| {
        if group.is_some() {
            match engine.top_restaurants(query, order.order, order.rule, &origin, limit) {
                Ok(hits) => print_restaurants(query, &hits, as_json)?,
                Err(err) => eprintln!("error: {err}"),
            }
        } else {
            match engine.top_dishes(query, order.order, order.rule, &origin, limit) {
                Ok(hits) => print_dishes(query, &hits, as_json)?,
                Err(err) => eprintln!("error: {err}"),
            }
        }
        Ok(())
    })
}

/// Calls `handle` for every non-blank stdin line, prompting only when stdin is a terminal.
fn for_each_query<F>(mut handle: F) -> Result<(), Box<dyn Error>>
where
    F: FnMut(&str) -> Result<(), Box<dyn Error>>,
{
    let interactive = atty::is(Stream::Stdin);
    let mut lines = io::stdin().lock().lines();
    loop {
        if interactive {
            print!("> ");
            io::stdout().flush()?;
        }
        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        let query = line.trim();
        if !query.is_empty() {
            handle(query)?;
        }
    }
    Ok(())
}

fn print_response(query: &str, response: &Response, as_json: bool) -> Result<(), Box<dyn Error>> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    match response.data() {
        Ok(records) => print_records_table(query, records),
        Err(_) => println!(
            "Query failed: {}",
            response.message.as_deref().unwrap_or("no reason given")
        ),
    }
    Ok(())
}

fn print_dishes(query: &str, hits: &[DishHit<'_>], as_json: bool) -> Result<(), Box<dyn Error>> {
    let records: Vec<ResultRecord> = hits.iter().map(ResultRecord::from).collect();
    if as_json {
        let payload = json!({ "query": query, "results": records });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        print_records_table(query, &records);
    }
    Ok(())
}

fn print_restaurants(
    query: &str,
    hits: &[RestaurantHit<'_>],
    as_json: bool,
) -> Result<(), Box<dyn Error>> {
    if as_json {
        let payload = json!({
            "query": query,
            "results": hits.iter().map(|hit| {
                json!({
                    "restaurant": hit.restaurant.name,
                    "rank": hit.rank,
                    "dishes": hit.dishes.iter().map(|dish| &dish.description).collect::<Vec<_>>(),
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No restaurants matched \"{query}\".");
        return Ok(());
    }
    let width = hits
        .iter()
        .map(|hit| hit.restaurant.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("RESTAURANT".len());
    println!("{:<width$}  {:>6}  {}", "RESTAURANT", "RANK", "DISHES", width = width);
    println!("{:-<width$}  {:->6}  {}", "", "", "------", width = width);
    for hit in hits {
        let dishes: Vec<_> = hit.dishes.iter().map(|dish| dish.description.as_str()).collect();
        println!(
            "{:<width$}  {:>6.2}  {}",
            hit.restaurant.name,
            hit.rank,
            dishes.join("; "),
            width = width
        );
    }
    Ok(())
}

fn print_records_table(query: &str, records: &[ResultRecord]) {
    if records.is_empty() {
        println!("No dishes matched \"{query}\".");
        return;
    }
    let width = records
        .iter()
        .map(|record| record.description.chars().count())
        .max()
        .unwrap_or(0)
        .max("DISH".len());
    println!(
        "{:>6}  {:>8}  {:<width$}  {}",
        "RANK",
        "PRICE",
        "DISH",
        "RESTAURANT",
        width = width
    );
    println!("{:->6}  {:->8}  {:-<width$}  {}", "", "", "", "----------", width = width);
    for record in records {
        let price = record
            .price
            .map(|price| format!("{price:.2}"))
            .unwrap_or_else(|| "<none>".to_string());
        println!(
            "{:>6.2}  {:>8}  {:<width$}  {}",
            record.rank,
            price,
            record.description,
            record.restaurant.name,
            width = width
        );
    }
}
