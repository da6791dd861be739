// Copyright (C) 2024 kitbash contributors
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use clap::Parser;
use once_cell::sync::Lazy;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// The `.kgraph.ron` files to compile. Directories are searched
    /// recursively.
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Loads the compile options from the given RON file
    #[arg(long)]
    pub options: Option<String>,

    /// Overrides the optimization level of the compile options
    #[arg(long)]
    pub optimization_level: Option<u32>,

    /// Prints the compiled model as RON
    #[arg(long)]
    pub dump: bool,

    /// Lists the nodes that were never reached from a root object
    #[arg(long)]
    pub orphans: bool,
}

/// CLI args are stored in a lazy static variable so they're accessible from
/// everywhere. Arguments are parsed on first access.
pub static CLI_ARGS: Lazy<Args> = Lazy::new(Args::parse);
