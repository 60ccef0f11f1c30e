use clap::Parser;
use std::{
    error::Error,
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use ferry::{
    Context, Output, Reply, RequestHandle, Status,
    cli::{Command, prompt},
    engine::memory::MemoryEngine,
    validation::Validator,
};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to data directory
    path: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let engine = Arc::new(MemoryEngine::open(cli.path)?);
    let ctx = Context::new(engine.clone());

    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    loop {
        let cmd = match prompt(&mut stdin, &mut stdout)? {
            None => break,
            Some(Ok(cmd)) => cmd,
            Some(Err(e)) => {
                eprintln!("error: {e}");
                continue;
            }
        };

        let out: Result<String, Status> = match cmd {
            Command::Exit => break,
            Command::Create(table) => ctx
                .validator()
                .validate_name(&table)
                .and_then(|_| engine.create_table(&table).map_err(Into::into))
                .map(|_| format!("created '{table}'")),
            Command::Partition { table, tag } => engine
                .create_partition(&table, &tag)
                .map(|name| format!("created partition '{name}'"))
                .map_err(Into::into),
            Command::Insert { table, rows } => engine
                .insert(&table, rows)
                .map(|_| format!("buffered {rows} row(s) in '{table}'"))
                .map_err(Into::into),
            Command::Index(table) => engine
                .build_index(&table)
                .map(|_| format!("built index of '{table}'"))
                .map_err(Into::into),
            Command::Count(table) => render(RequestHandle::count_table(&ctx, table).execute()),
            Command::DropIndex(table) => render(RequestHandle::drop_index(&ctx, table).execute()),
            Command::Flush(tables) => render(RequestHandle::flush(&ctx, tables).execute()),
            Command::Describe(table) => {
                render(RequestHandle::describe_table(&ctx, table).execute())
            }
        };

        match out {
            Ok(out) => writeln!(&mut stdout, "{out}")?,
            Err(status) => eprintln!("error: {status}"),
        }
    }

    Ok(())
}

fn render(reply: Reply) -> Result<String, Status> {
    match reply.into_result()? {
        Output::Unit => Ok("ok".to_string()),
        Output::RowCount(count) => Ok(count.to_string()),
        Output::Schema(schema) => Ok(schema.table_id),
    }
}
