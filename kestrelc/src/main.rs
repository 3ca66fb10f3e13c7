use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use kestrelc::{CompileError, Compiler};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Options {
    source_path: Option<PathBuf>,
    output: Option<PathBuf>,
    emit_ir: bool,
    check_only: bool,
    run_main: bool,
    emit_obj: Option<PathBuf>,
}

fn main() {
    init_tracing();

    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {:#}", err);
            std::process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("KESTREL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<i32> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.first().map(String::as_str) == Some("repl") {
        kestrelc::repl::run()?;
        return Ok(0);
    }

    let options = parse_args(&args)?;
    let Some(source_path) = options.source_path.as_deref() else {
        bail!(usage());
    };

    let source = fs::read_to_string(source_path)
        .with_context(|| format!("failed to read '{}'", source_path.display()))?;
    let module_name = source_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("main");

    let module = match Compiler::new().compile_source(&source, module_name) {
        Ok(module) => module,
        Err(CompileError::Frontend(errors)) => {
            let label = source_path.display().to_string();
            eprintln!(
                "{}",
                kestrel::errors::pretty::format_parse_errors(&label, &source, &errors)
            );
            return Ok(1);
        }
        Err(err) => return Err(err).context("compilation failed"),
    };

    if options.check_only {
        println!("{}: ok", source_path.display());
        return Ok(0);
    }

    if options.emit_ir {
        print!("{}", module);
    } else {
        let output = options
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(source_path));
        write_output_file(&output, module.to_string().as_bytes())?;
        info!(path = %output.display(), "wrote IR");
    }

    if let Some(path) = options.emit_obj.as_deref() {
        let bytes = native::object_bytes(&module)?;
        write_output_file(path, &bytes)?;
        println!("wrote object file {}", path.display());
    }

    if options.run_main {
        let exit_code = native::run_main(&module)?;
        println!("program exited with code {}", exit_code);
    }

    Ok(0)
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut positional = Vec::new();
    let mut index = 0;
    while index < args.len() {
        let arg = &args[index];
        match arg.as_str() {
            "--emit-ir" => options.emit_ir = true,
            "--check" => options.check_only = true,
            "--run" => options.run_main = true,
            "-o" | "--output" => {
                index += 1;
                let path = args
                    .get(index)
                    .ok_or_else(|| anyhow!("{} requires a path", arg))?;
                options.output = Some(PathBuf::from(path));
            }
            "--emit-obj" => {
                index += 1;
                let path = args
                    .get(index)
                    .ok_or_else(|| anyhow!("--emit-obj requires a path"))?;
                options.emit_obj = Some(PathBuf::from(path));
            }
            "-h" | "--help" => bail!(usage()),
            _ if arg.starts_with("--emit-obj=") => {
                options.emit_obj = arg.strip_prefix("--emit-obj=").map(PathBuf::from);
            }
            _ if arg.starts_with('-') => bail!("unknown option '{}'\n{}", arg, usage()),
            _ => positional.push(PathBuf::from(arg)),
        }
        index += 1;
    }

    let mut positional = positional.into_iter();
    options.source_path = positional.next();
    if let Some(output) = positional.next() {
        if options.output.is_some() {
            bail!("output path given both positionally and with -o");
        }
        options.output = Some(output);
    }
    if positional.next().is_some() {
        bail!("too many arguments\n{}", usage());
    }
    Ok(options)
}

#[cfg(feature = "cranelift-backend")]
mod native {
    use anyhow::{Context, Result};
    use kestrelc::backend::cranelift::CraneliftBackend;
    use kestrelc::backend::Backend;
    use kestrelc::ir::Module;

    pub fn object_bytes(module: &Module) -> Result<Vec<u8>> {
        CraneliftBackend::new()?
            .generate(module)
            .context("object generation failed")
    }

    pub fn run_main(module: &Module) -> Result<i64> {
        CraneliftBackend::new()?
            .run_main(module)
            .context("jit execution failed")
    }
}

#[cfg(not(feature = "cranelift-backend"))]
mod native {
    use anyhow::{bail, Result};
    use kestrelc::ir::Module;

    pub fn object_bytes(_module: &Module) -> Result<Vec<u8>> {
        bail!("--emit-obj requires the cranelift-backend feature")
    }

    pub fn run_main(_module: &Module) -> Result<i64> {
        bail!("--run requires the cranelift-backend feature")
    }
}

fn default_output_path(source_path: &Path) -> PathBuf {
    source_path.with_extension("ll")
}

fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create output directory '{}'", parent.display())
            })?;
        }
    }

    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file '{}'", path.display()))
}

fn usage() -> String {
    format!(
        "kestrelc {}\n\nUsage:\n  kestrelc <file> [<out.ll>] [--emit-ir] [-o <out.ll>] [--check] [--run] [--emit-obj <path>]\n  kestrelc repl",
        kestrelc::VERSION
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn second_positional_is_the_output_path() {
        let options = parse_args(&args(&["prog.k", "out/prog.ll"])).unwrap();
        assert_eq!(options.source_path, Some(PathBuf::from("prog.k")));
        assert_eq!(options.output, Some(PathBuf::from("out/prog.ll")));

        let options = parse_args(&args(&["prog.k", "-o", "a.ll", "--run"])).unwrap();
        assert_eq!(options.output, Some(PathBuf::from("a.ll")));
        assert!(options.run_main);
    }

    #[test]
    fn conflicting_or_extra_arguments_are_rejected() {
        assert!(parse_args(&args(&["prog.k", "a.ll", "-o", "b.ll"])).is_err());
        assert!(parse_args(&args(&["prog.k", "a.ll", "b.ll"])).is_err());
        assert!(parse_args(&args(&["prog.k", "--bogus"])).is_err());
    }
}
