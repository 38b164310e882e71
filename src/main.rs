use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use squirt::runtime::table::Table;
use squirt::runtime::value::{self, Value};
use squirt::runtime::ScopeRef;
use squirt::{default_namespace, excerpt, parser};

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let mut args = std::env::args().skip(1);
    let mut dump_ast = false;
    let mut dump_excerpt = false;
    let mut input_path: Option<String> = None;
    let mut argv: Vec<String> = Vec::new();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-ast" => dump_ast = true,
            "-excerpt" => dump_excerpt = true,
            _ => {
                input_path = Some(arg);
                argv = args.collect();
                break;
            }
        }
    }

    if dump_ast || dump_excerpt {
        let path = input_path.context("-ast and -excerpt need a file to read")?;
        let root = parser::parse_file(&path)?;
        if dump_ast {
            let json = serde_json::to_string(&root).context("serializing AST")?;
            println!("{json}");
        } else {
            println!("{}", excerpt::from_file(&path, root.pos));
        }
        return Ok(ExitCode::SUCCESS);
    }

    let scope = default_namespace(None);
    let result = match input_path {
        Some(path) => {
            bind_argv(&scope, &argv)?;
            squirt::eval_file(&scope, &path)
        }
        None => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("reading stdin")?;
            bind_argv(&scope, &[])?;
            squirt::eval_str(&scope, &source)
        }
    };

    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            println!("{err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn bind_argv(scope: &ScopeRef, argv: &[String]) -> Result<()> {
    let mut values = Vec::with_capacity(argv.len());
    for arg in argv {
        let lifted = value::to_value(scope, Value::Str(arg.clone()))
            .map_err(|err| anyhow::anyhow!("binding ARGV: {err}"))?;
        values.push(lifted);
    }
    let table = Table::from_arr(values).share();
    let argv_table = value::to_value(scope, Value::Table(table))
        .map_err(|err| anyhow::anyhow!("binding ARGV: {err}"))?;
    scope.set("ARGV", argv_table);
    Ok(())
}
