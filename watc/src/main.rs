use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};

use watc::backends::BackendType;
use watc::parser;

#[derive(Parser)]
#[command(name = "watc")]
#[command(about = "JavaScript subset to WebAssembly text compiler", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Компилирует исходник в WAT
    Compile {
        /// Исходник
        input: String,

        /// Цель: wat32 или wat64
        #[arg(short, long, default_value = "wat32")]
        target: String,

        /// Выходной файл
        #[arg(short, long)]
        output: Option<String>,

        /// Показать ast
        #[arg(long)]
        show_ast: bool,

        /// Сохранить ast в <input>.ast.json
        #[arg(long)]
        emit_ast: bool,

        /// Печатать шаги парсера в stderr
        #[arg(long)]
        trace: bool,
    },

    /// Распарсить и показать ast без компиляции
    Parse {
        /// Исходник
        input: String,

        /// Печатать шаги парсера в stderr
        #[arg(long)]
        trace: bool,
    },

    /// Список поддерживаемых целей
    Targets,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { input, target, output, show_ast, emit_ast, trace } => {
            println!("Compiling {} for {}...", input, target);

            let source = fs::read_to_string(&input)?;
            let program = parser::Parser::new(&source)?.with_trace(trace).parse_program()?;

            if show_ast {
                println!("=== AST ===");
                println!("{:#?}", program);
            }

            // Автоматические имена: input.wat и input.ast.json рядом с исходником
            let base = Path::new(&input).with_extension("");

            if emit_ast {
                let ast_path = base.with_extension("ast.json");
                fs::write(&ast_path, serde_json::to_string_pretty(&program)?)?;
                println!("AST written to: {}", ast_path.display());
            }

            match BackendType::from_name(&target) {
                Some(backend_type) => {
                    let backend = backend_type.create();
                    let text = backend.compile(&program)?;

                    let output_path = match output {
                        Some(path) => path,
                        None => base.with_extension("wat").display().to_string(),
                    };

                    fs::write(&output_path, &text)?;
                    println!("Compiled to: {}", output_path);
                    println!("Code size: {} lines", text.lines().count());
                }
                None => {
                    eprintln!("Unknown target: {}", target);
                }
            }
        }
        Commands::Parse { input, trace } => {
            println!("Parsing {}...", input);

            let source = fs::read_to_string(&input)?;

            println!("=== SOURCE ===");
            println!("{}", source);
            println!("=== TOKENS ===");

            let tokens = parser::lexer::tokenize(&source)?;
            for token in &tokens {
                println!("{:?}", token);
            }

            println!("=== AST ===");
            match parser::Parser::new(&source).and_then(|p| p.with_trace(trace).parse_program()) {
                Ok(program) => {
                    println!("{:#?}", program);
                }
                Err(e) => {
                    eprintln!("Error: {}", e);
                }
            }
        }
        Commands::Targets => {
            println!("Supported targets:");
            for backend in BackendType::all() {
                println!("  {:8} - {}", backend.name(), backend.description());
            }
        }
    }

    Ok(())
}
