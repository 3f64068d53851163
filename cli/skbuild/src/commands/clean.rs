//! `skbuild clean`: remove intermediate build directories.

use anyhow::Result;

use crate::manifest::Project;

pub fn run(project: &Project, sources: bool) -> Result<()> {
    let ws = project.workspace();
    let removed = ws.clean(sources)?;
    if removed.is_empty() {
        println!("Already clean: {}", ws.root().display());
    }
    for dir in removed {
        println!("Removed {}", dir.display());
    }
    Ok(())
}
