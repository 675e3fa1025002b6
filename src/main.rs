//! kiji - JATS article converter

use std::process::ExitCode;

use clap::Parser;

use kiji::{Conversion, NodeType, Result, convert_article};

#[derive(Parser)]
#[command(name = "kiji")]
#[command(version, about = "JATS article converter", long_about = None)]
#[command(after_help = "EXAMPLES:
    kiji article.xml article.json    Convert JATS XML to JSON nodes
    kiji -i article.xml              Show article summary")]
struct Cli {
    /// Input JATS XML file
    #[arg(value_name = "INPUT")]
    input: String,

    /// Output JSON file
    #[arg(value_name = "OUTPUT", required_unless_present = "info")]
    output: Option<String>,

    /// Show article summary without converting
    #[arg(short, long)]
    info: bool,

    /// Suppress warning messages
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = if cli.info {
        show_info(&cli.input)
    } else {
        let output = cli.output.expect("output required");
        convert(&cli.input, &output, cli.quiet)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load(path: &str) -> Result<Conversion> {
    let xml = std::fs::read(path)?;
    convert_article(&xml)
}

fn show_info(path: &str) -> std::result::Result<(), String> {
    let conversion = load(path).map_err(|e| e.to_string())?;

    let count = |t: NodeType| {
        conversion
            .nodes
            .iter()
            .filter(|n| n.node_type == t)
            .count()
    };

    println!("File: {path}");
    if let Some(record) = conversion
        .nodes
        .iter()
        .find(|n| n.node_type == NodeType::ArticleRecord)
    {
        if let Some(title) = record.get_str("title") {
            println!("Title: {title}");
        }
        if let Some(doi) = record.get_str("doi")
            && !doi.is_empty()
        {
            println!("DOI: {doi}");
        }
    }
    println!("Nodes: {}", conversion.nodes.len());
    println!("Sections: {}", count(NodeType::Section));
    println!("Paragraphs: {}", count(NodeType::Paragraph));
    println!("References: {}", count(NodeType::Reference));
    println!(
        "Marks: {}",
        conversion
            .nodes
            .iter()
            .filter(|n| n.node_type.is_mark())
            .count()
    );
    println!("Comments: {}", count(NodeType::Comment));
    println!("Warnings: {}", conversion.warnings.len());

    Ok(())
}

fn convert(input: &str, output: &str, quiet: bool) -> std::result::Result<(), String> {
    let conversion = load(input).map_err(|e| e.to_string())?;

    if !quiet {
        for warning in &conversion.warnings {
            eprintln!("warning: {warning}");
        }
    }

    let json = serde_json::to_string_pretty(&conversion.nodes).map_err(|e| e.to_string())?;
    std::fs::write(output, json).map_err(|e| e.to_string())?;

    if !quiet {
        println!("Wrote {} nodes to {output}", conversion.nodes.len());
    }

    Ok(())
}
