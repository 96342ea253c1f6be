use crate::cli::args::ExtractArgs;
use crate::cli::helpers::read_file;
use crate::exit_codes::SUCCESS;

/// Prints one `name<TAB>type` line per distinct placeholder, in order of
/// first appearance.
pub fn run(args: ExtractArgs) -> anyhow::Result<i32> {
    let content = match (args.file, args.content) {
        (Some(path), _) => read_file(&path)?,
        (None, content) => content.unwrap_or_default(),
    };
    for placeholder in stencil_core::extract(&content) {
        println!("{}\t{}", placeholder.name, placeholder.inferred_type);
    }
    Ok(SUCCESS)
}
