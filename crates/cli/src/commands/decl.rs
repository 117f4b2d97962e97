use std::process;

use rib_core::declaration::DeclGrammar;
use rib_core::{DeclarationRegistry, Options, TokenMap};

use crate::{report_error, OutputFormat};

pub(crate) fn cmd_decl(
    grammar: &str,
    name: Option<&str>,
    options: &Options,
    output: OutputFormat,
    quiet: bool,
) {
    let parsed = match DeclGrammar::parse(grammar) {
        Ok(p) => p,
        Err(e) => {
            report_error(&format!("invalid declaration: {}", e), output, quiet);
            process::exit(1);
        }
    };
    let Some(name) = name.map(str::to_owned).or(parsed.name) else {
        report_error(
            &format!("declaration '{}' needs a name (use --name)", grammar),
            output,
            quiet,
        );
        process::exit(1);
    };

    let mut tokens = TokenMap::new();
    let mut registry = DeclarationRegistry::new();
    let decl = registry
        .declare(&mut tokens, &name, grammar, options.color_samples, false)
        .map(|token| registry.find(token).and_then(|id| registry.get(id)));
    let decl = match decl {
        Ok(Some(d)) => d,
        Ok(None) => {
            report_error(&format!("declaration of '{}' was not registered", name), output, quiet);
            process::exit(1);
        }
        Err(e) => {
            report_error(&format!("invalid declaration: {}", e), output, quiet);
            process::exit(1);
        }
    };

    let part = |t: Option<rib_core::TokenId>| t.and_then(|t| tokens.name(t));
    match output {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "name": tokens.name(decl.token),
                "namespace": part(decl.namespace),
                "table": part(decl.table),
                "var": tokens.name(decl.var),
                "class": decl.class,
                "type": decl.ty,
                "basic_type": decl.basic,
                "array_size": decl.array_size,
                "elem_size": decl.elem_size,
            });
            let json = serde_json::to_string_pretty(&value)
                .unwrap_or_else(|e| format!("{{\"error\": \"serialization: {}\"}}", e));
            println!("{}", json);
        }
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "{}: {} {}[{}] ({} values per element, {})",
                    tokens.name_or_empty(decl.token),
                    decl.class,
                    decl.ty,
                    decl.array_size,
                    decl.elem_size,
                    decl.basic
                );
            }
        }
    }
}
