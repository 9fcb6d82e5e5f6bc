//! Print the oracle's transition sequence for each sentence of a column file
//!
//! ```text
//! cargo run --example oracle_trace -- sentences.conll [config.toml]
//! ```

use depparse::{
    ColumnReader, OracleLabeler, ParserConfig, Projectivizer, TraceEvent, TraceSink,
    TransitionParser, is_projective,
};
use std::error::Error;

struct PrintSink;

impl TraceSink for PrintSink {
    fn on_transition(&mut self, event: &TraceEvent<'_>) {
        println!("{}", event);
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let path = args.next().ok_or("usage: oracle_trace <file> [config.toml]")?;
    let config = match args.next() {
        Some(config) => ParserConfig::from_file(config)?,
        None => ParserConfig::default(),
    };
    let projectivizer = Projectivizer::from_config(&config);
    let parser = TransitionParser::new(config);

    for (index, tree) in ColumnReader::from_path(&path)?.enumerate() {
        let mut tree = tree?;
        println!("# sentence {}: {}", index + 1, tree.to_raw_string());
        if !is_projective(&tree) {
            let lifts = projectivizer.projectivize(&mut tree);
            println!("# lifted {} non-projective arcs", lifts);
        }

        let mut oracle = OracleLabeler::from_tree(&tree)?;
        let trace = parser.parse_traced(&mut tree, &mut oracle, &mut PrintSink)?;
        println!("# {} transitions\n", trace.count());
    }
    Ok(())
}
