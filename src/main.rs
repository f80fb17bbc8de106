use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs::File;
use tradeledger::domain::parse_timestamp;
use tradeledger::{
    apply_transaction, apply_transaction_batch, config::Config, init_db, ApplyOutcome, Decimal,
    FeeSpec, PortfolioName, Repository, Symbol, TransactionRequest, TransactionTable,
};

#[derive(Parser)]
#[command(name = "tradeledger")]
#[command(about = "Position, average cost and realized P&L ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a single transaction
    Apply {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        symbol: String,
        /// RFC 3339 or YYYY-MM-DD
        #[arg(long)]
        timestamp: String,
        /// Signed quantity (negative sells)
        #[arg(long, allow_hyphen_values = true)]
        quantity: String,
        #[arg(long)]
        price: String,
        /// Fixed fee; FEE_RULE applies when omitted
        #[arg(long, allow_hyphen_values = true)]
        fee: Option<String>,
    },

    /// Apply an ordered batch from a CSV file (timestamp,quantity,price[,fees])
    Import {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        csv: String,
    },

    /// Print ledger records as JSON lines
    Show {
        #[arg(long)]
        portfolio: String,
        #[arg(long)]
        symbol: String,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("configuration error")?;

    let pool = init_db(&config.database_path)
        .await
        .with_context(|| format!("failed to open database {}", config.database_path))?;
    let repo = Repository::new(pool);
    let registry = config.registry();
    let options = config.apply_options();

    match cli.cmd {
        Commands::Apply {
            portfolio,
            symbol,
            timestamp,
            quantity,
            price,
            fee,
        } => {
            let (portfolio, symbol) = (PortfolioName::new(portfolio), Symbol::new(symbol));
            let fee = match fee {
                Some(raw) => FeeSpec::Fixed(parse_decimal("fee", &raw)?),
                None => config
                    .fee_rule
                    .map(|rule| rule.to_fee_spec())
                    .unwrap_or_default(),
            };
            let request = TransactionRequest::new(
                parse_time("timestamp", &timestamp)?,
                parse_decimal("quantity", &quantity)?,
                parse_decimal("price", &price)?,
            )
            .with_fee(fee);

            let mut ledger = repo
                .open_ledger(&portfolio, &symbol, config.init_date)
                .await?;
            let outcome = apply_transaction(&mut ledger, &registry, &request, &options)?;
            repo.append_records(&portfolio, &symbol, &outcome.records)
                .await?;
            print_outcome(&outcome)?;
        }
        Commands::Import {
            portfolio,
            symbol,
            csv,
        } => {
            let (portfolio, symbol) = (PortfolioName::new(portfolio), Symbol::new(symbol));
            let file = File::open(&csv).with_context(|| format!("failed to open {}", csv))?;
            let table = TransactionTable::from_csv_reader(file)?;

            let mut ledger = repo
                .open_ledger(&portfolio, &symbol, config.init_date)
                .await?;
            let outcome = apply_transaction_batch(&mut ledger, &registry, &table, &options)?;
            repo.append_records(&portfolio, &symbol, &outcome.records)
                .await?;
            print_outcome(&outcome)?;
        }
        Commands::Show {
            portfolio,
            symbol,
            from,
            to,
        } => {
            let from = from.map(|s| parse_time("from", &s)).transpose()?;
            let to = to.map(|s| parse_time("to", &s)).transpose()?;
            let records = repo
                .query_records(&PortfolioName::new(portfolio), &Symbol::new(symbol), from, to)
                .await?;
            for record in &records {
                println!("{}", serde_json::to_string(record)?);
            }
        }
    }

    Ok(())
}

fn print_outcome(outcome: &ApplyOutcome) -> Result<()> {
    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }
    if let Some(summary) = &outcome.summary {
        eprintln!("{}", summary);
    }
    for record in &outcome.records {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn parse_decimal(field: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str_canonical(raw).with_context(|| format!("invalid {}: {}", field, raw))
}

fn parse_time(field: &str, raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    match parse_timestamp(raw) {
        Some(ts) => Ok(ts),
        None => bail!("invalid {}: {} (expected RFC 3339 or YYYY-MM-DD)", field, raw),
    }
}
