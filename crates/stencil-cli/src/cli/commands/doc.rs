use anyhow::bail;
use stencil_core::{DocumentStatus, DocumentUpdate, ModelSettings, NewDocument, RenderOverrides};

use crate::cli::args::{DocArgs, DocCmd, DocCreateArgs, DocRenderArgs, DocUpdateArgs};
use crate::cli::helpers::{find_doc_id, parse_vars, read_file, Workspace};
use crate::exit_codes::SUCCESS;

pub fn run(args: DocArgs, ws: &Workspace) -> anyhow::Result<i32> {
    match args.cmd {
        DocCmd::Create(args) => create(args, ws),
        DocCmd::Update(args) => update(args, ws),
        DocCmd::List => list(ws),
        DocCmd::History { slug } => history(&slug, ws),
        DocCmd::Restore { slug, version } => {
            let docs = ws.documents();
            let id = find_doc_id(&docs, &slug)?;
            let (_, v) = docs.restore(id, version)?;
            println!("{} v{}: {}", slug, v.version_number, v.change_description);
            Ok(SUCCESS)
        }
        DocCmd::Diff { slug, from, to } => {
            let docs = ws.documents();
            let diff = docs.diff(find_doc_id(&docs, &slug)?, from, to)?;
            if diff.is_empty() {
                println!("no changes between v{} and v{}", from, to);
                return Ok(SUCCESS);
            }
            println!("changed: {}", diff.changed_fields.join(", "));
            print!("{}", diff.content_diff);
            Ok(SUCCESS)
        }
        DocCmd::Render(args) => render(args, ws),
        DocCmd::Params { slug } => {
            let docs = ws.documents();
            for p in docs.parameters(find_doc_id(&docs, &slug)?)? {
                let required = if p.required { "required" } else { "optional" };
                match &p.default_value {
                    Some(default) => {
                        println!("{}\t{}\t{}\tdefault={}", p.name, p.param_type, required, default)
                    }
                    None => println!("{}\t{}\t{}", p.name, p.param_type, required),
                }
            }
            Ok(SUCCESS)
        }
        DocCmd::Delete { slug } => {
            let docs = ws.documents();
            docs.delete(find_doc_id(&docs, &slug)?)?;
            println!("deleted {}", slug);
            Ok(SUCCESS)
        }
    }
}

fn create(args: DocCreateArgs, ws: &Workspace) -> anyhow::Result<i32> {
    let content = read_file(&args.file)?;
    let settings = ModelSettings {
        model: args
            .settings
            .model
            .unwrap_or_else(|| ws.config.default_model.clone()),
        temperature: args.settings.temperature,
        max_tokens: args.settings.max_tokens,
    };
    let mut new = NewDocument::new(args.name, content).with_settings(settings);
    new.slug = args.slug;
    if let Some(instructions) = args.instructions {
        new = new.with_instructions(instructions);
    }

    let docs = ws.documents();
    let doc = docs.create(new)?;
    println!("{}", doc.slug);
    for p in docs.parameters(doc.id)? {
        println!("  {}\t{}", p.name, p.param_type);
    }
    Ok(SUCCESS)
}

fn update(args: DocUpdateArgs, ws: &Workspace) -> anyhow::Result<i32> {
    let status = match args.status.as_deref() {
        Some(s) => match DocumentStatus::parse(s) {
            Some(status) => Some(status),
            None => bail!("unknown status {:?}; expected draft, active or archived", s),
        },
        None => None,
    };
    let content = args.file.as_deref().map(read_file).transpose()?;
    let update = DocumentUpdate {
        name: args.name,
        status,
        content,
        instructions: args.instructions.map(Some),
        model: args.settings.model,
        temperature: args.settings.temperature.map(Some),
        max_tokens: args.settings.max_tokens.map(Some),
        metadata: None,
    };

    let docs = ws.documents();
    let (doc, version) = docs.update(find_doc_id(&docs, &args.slug)?, update)?;
    match version {
        Some(v) => println!("{} v{}: {}", doc.slug, v.version_number, v.change_description),
        None => println!("{}: no tracked changes", doc.slug),
    }
    Ok(SUCCESS)
}

fn list(ws: &Workspace) -> anyhow::Result<i32> {
    for doc in ws.documents().list()? {
        println!("{}\t{}\t{}", doc.slug, doc.status.as_str(), doc.name);
    }
    Ok(SUCCESS)
}

fn history(slug: &str, ws: &Workspace) -> anyhow::Result<i32> {
    let docs = ws.documents();
    for v in docs.history(find_doc_id(&docs, slug)?)? {
        println!(
            "v{}\t{}\t{}",
            v.version_number,
            v.created_at.format("%Y-%m-%d %H:%M:%S"),
            v.change_description
        );
    }
    Ok(SUCCESS)
}

fn render(args: DocRenderArgs, ws: &Workspace) -> anyhow::Result<i32> {
    let values = parse_vars(&args.vars)?;
    let overrides = RenderOverrides {
        model: args.settings.model,
        temperature: args.settings.temperature,
        max_tokens: args.settings.max_tokens,
        instructions: args.instructions,
    };
    let docs = ws.documents();
    let out = docs.render(find_doc_id(&docs, &args.slug)?, &values, &overrides, args.version)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{}", out.content);
    }
    Ok(SUCCESS)
}
