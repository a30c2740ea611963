// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! ifcview - index, inspect and package IFC models from the command line

mod commands;

use anyhow::Result;
use clap::Parser;

use commands::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    commands::init_logging(&cli);
    commands::run(cli)
}
