use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tabula::db::ColumnOptions;
use tabula::{DataType, Db};

/// A command line interface for the tabula engine.
#[derive(Parser)]
#[command(name = "tabula", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an expression against a scratch table and print its type.
    ///
    /// The scratch table carries one column per scalar type, named
    /// `bool_value`, `int_value`, `float_value`, `geo_value` and
    /// `text_value`, plus the `_id` and `_score` pseudo columns.
    Eval {
        /// The infix expression, e.g. `int_value * 2 < 10`.
        expression: String,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        None => {
            bail!("no command given; try `tabula --help`");
        }
        Some(Command::Eval { expression }) => eval(&expression),
    }
}

fn eval(input: &str) -> Result<()> {
    let mut db = Db::new();
    let table = db.create_table("scratch").context("scratch table")?;
    for (name, data_type) in [
        ("bool_value", DataType::Bool),
        ("int_value", DataType::Int),
        ("float_value", DataType::Float),
        ("geo_value", DataType::GeoPoint),
        ("text_value", DataType::Text),
    ] {
        db.create_column(table, name, data_type, ColumnOptions::default())
            .with_context(|| format!("column {name}"))?;
    }
    match tabula::expr::parse(&db, table, input) {
        Ok(expression) => {
            println!("{}", expression.data_type());
            Ok(())
        }
        Err(error) => bail!("{error} ({:?})", error.kind()),
    }
}
