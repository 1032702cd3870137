//! Schema command - print what is sent to the model.

use clap::{Args, ValueEnum};

use invex_core::Invoice;
use invex_core::prompt::{INVOICE_INSTRUCTION, invoice_prompt};

/// Arguments for the schema command.
#[derive(Args)]
pub struct SchemaArgs {
    /// What to print
    #[arg(value_enum, default_value = "json-schema")]
    what: SchemaKind,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SchemaKind {
    /// JSON schema used for guided decoding
    JsonSchema,
    /// Fully rendered prompt
    Prompt,
    /// Instruction block alone
    Instruction,
}

pub async fn run(args: SchemaArgs) -> anyhow::Result<()> {
    match args.what {
        SchemaKind::JsonSchema => {
            println!("{}", serde_json::to_string_pretty(&Invoice::json_schema())?);
        }
        SchemaKind::Prompt => println!("{}", invoice_prompt()),
        SchemaKind::Instruction => println!("{}", INVOICE_INSTRUCTION),
    }
    Ok(())
}
