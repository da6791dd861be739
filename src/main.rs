// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kitbash_engine::compiler::{compile_graph, CompileOptions};
use kitbash_engine::graph::serialization::SerializedGraph;

/// Command line arguments
pub mod cli_args;
use cli_args::CLI_ARGS;

const GRAPH_EXTENSION: &str = ".kgraph.ron";

/// Expands the inputs to the list of graph files to compile, in a stable
/// order.
fn collect_graph_files(inputs: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = vec![];
    for input in inputs {
        let path = Path::new(input);
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path).sort_by_file_name() {
                let entry = entry.with_context(|| format!("Could not walk {input}"))?;
                let is_graph = entry
                    .file_name()
                    .to_str()
                    .map_or(false, |name| name.ends_with(GRAPH_EXTENSION));
                if entry.file_type().is_file() && is_graph {
                    files.push(entry.into_path());
                }
            }
        } else {
            files.push(path.to_owned());
        }
    }
    Ok(files)
}

fn load_options() -> Result<CompileOptions> {
    let mut options = match &CLI_ARGS.options {
        Some(path) => CompileOptions::load_from_file(path)?,
        None => CompileOptions::default(),
    };
    if let Some(level) = CLI_ARGS.optimization_level {
        options.optimization_level = level;
    }
    Ok(options)
}

/// Compiles a single graph file. Returns whether it compiled without errors.
fn compile_file(path: &Path, options: &CompileOptions) -> Result<bool> {
    let graph = SerializedGraph::load_from_file(path)?.into_runtime()?;
    let output = compile_graph(&graph, options.clone());

    for diagnostic in &output.diagnostics {
        let location = diagnostic
            .node
            .map(|node| format!(" [node {}]", node.display_id()))
            .unwrap_or_default();
        println!("{}: {diagnostic}{location}", path.display());
    }

    if CLI_ARGS.orphans {
        for node in output.orphan_nodes(&graph) {
            println!(
                "{}: unreachable node {} [node {}]",
                path.display(),
                graph[node].label,
                node.display_id()
            );
        }
    }

    if CLI_ARGS.dump {
        let dump = ron::ser::to_string_pretty(&output.model, ron::ser::PrettyConfig::default())
            .context("Could not serialize the compiled model")?;
        println!("{dump}");
    }

    let object_count: usize = output.model.objects.iter().map(|o| o.walk().len()).sum();
    log::info!(
        "{}: {object_count} objects, {} parameters, {} diagnostics",
        path.display(),
        output.model.parameters.len(),
        output.diagnostics.len()
    );
    Ok(!output.has_errors())
}

fn main() {
    #[cfg(feature = "tracy")]
    let _client = profiling::tracy_client::Client::start();

    // Setup logging
    env_logger::init();

    let result = load_options().and_then(|options| {
        let files = collect_graph_files(&CLI_ARGS.inputs)?;
        let mut success = true;
        for file in files {
            match compile_file(&file, &options) {
                Ok(ok) => success &= ok,
                Err(err) => {
                    log::error!("{err:?}");
                    success = false;
                }
            }
        }
        Ok(success)
    });

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(err) => {
            log::error!("{err:?}");
            std::process::exit(2);
        }
    }
}
