//! `ocrkit handlers` -- list registered handlers.

use clap::Args;
use comfy_table::{Table, presets};

use ocrkit_core::HandlerRegistry;
use ocrkit_plugin::HandlerKind;

use super::build_registry;

/// Arguments for the `ocrkit handlers` subcommand.
#[derive(Args, Debug)]
pub struct HandlersArgs {
    /// Only show handlers of this kind (preprocess, train, evaluate, ocr).
    #[arg(short, long)]
    pub kind: Option<HandlerKind>,
}

pub fn run(args: HandlersArgs) -> anyhow::Result<()> {
    let registry = build_registry()?;
    if registry.list(args.kind).next().is_none() {
        match args.kind {
            Some(kind) => println!("No {kind} handlers registered."),
            None => println!("No handlers registered."),
        }
        return Ok(());
    }
    println!("{}", handler_table(&registry, args.kind));
    Ok(())
}

fn handler_table(registry: &HandlerRegistry, kind: Option<HandlerKind>) -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_header(vec!["ID", "KIND", "ALIASES", "VERSION", "CORE", "DESCRIPTION"]);
    for descriptor in registry.list(kind) {
        let info = descriptor.info();
        table.add_row(vec![
            info.id.clone(),
            info.kind.to_string(),
            info.aliases.join(", "),
            info.version.clone(),
            info.core_requirement.clone().unwrap_or_else(|| "*".into()),
            info.description.clone(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_filters_by_kind() {
        let reg = ocrkit_handlers::default_registry().unwrap();
        let all = handler_table(&reg, None).to_string();
        assert!(all.contains("demo_preprocess"));
        assert!(all.contains("linear_ocr"));
        assert!(all.contains("DemoTrainHandler"));

        let train = handler_table(&reg, Some(HandlerKind::Train)).to_string();
        assert!(train.contains("linear_train"));
        assert!(!train.contains("demo_ocr"));
    }
}
