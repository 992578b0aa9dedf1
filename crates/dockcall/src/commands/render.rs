//! Render command implementation
//!
//! Implements `dockcall render`: prints the exact runtime command line(s) for
//! an invocation without checking files or starting anything.

use anyhow::Result;
use dockcall_core::command::{render, render_ownership_fix};
use dockcall_core::ownership::HostOwner;
use dockcall_core::{Invocation, Settings};

/// Render command arguments
#[derive(Debug)]
pub struct RenderArgs {
    pub invocation: Invocation,
    pub with_ownership_fix: bool,
    pub settings: Settings,
}

/// Execute the render command
pub fn execute_render(args: RenderArgs) -> Result<()> {
    for line in rendered_lines(&args)? {
        println!("{}", line);
    }
    Ok(())
}

fn rendered_lines(args: &RenderArgs) -> Result<Vec<String>> {
    let mut lines = vec![render(&args.invocation, &args.settings).to_shell_line()];

    if args.with_ownership_fix {
        let owner = HostOwner::of(args.invocation.work_dir())?;
        for image in args.invocation.composition().distinct_images() {
            lines.push(
                render_ownership_fix(&args.invocation, &args.settings, image, owner.uid, owner.gid)
                    .to_shell_line(),
            );
        }
    }
    Ok(lines)
}
