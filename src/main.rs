//! pagetree - content index for flat-file page trees.

use anyhow::{Context, Result};
use clap::Parser;
use pagetree::{
    cli::{Cli, Commands},
    collection::{CollectionParams, QueryContext},
    index::{Dispatch, ListOptions, PageIndex, PageService},
    log, logger, watch,
};
use std::{fs, path::Path};

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::set_quiet(cli.quiet);

    let root = cli.root.as_deref().unwrap_or(Path::new("./"));
    let service = PageService::open(root, &cli.config)?;
    let index = service.index();

    match &cli.command {
        Commands::Build => {
            log!(
                "pages";
                "{} pages, {} routes, digest {}",
                index.instances().len(),
                index.routes().len(),
                &index.digest()[..12.min(index.digest().len())]
            );
            Ok(())
        }
        Commands::Routes => {
            print_routes(&index);
            Ok(())
        }
        Commands::Find { route } => find(&index, route),
        Commands::Tree { raw, modular, routable, depth } => {
            let options = ListOptions {
                raw_routes: *raw,
                show_all: !routable,
                show_modular: *modular,
                limit_levels: *depth,
                ..Default::default()
            };
            for (route, label) in index.list(&options)? {
                println!("{label}  {route}");
            }
            Ok(())
        }
        Commands::Collection { params, current, page } => {
            let text = fs::read_to_string(params)
                .with_context(|| format!("cannot read `{}`", params.display()))?;
            let params = CollectionParams::from_yaml(&text)?;
            let ctx = QueryContext {
                current: current.clone(),
                page: *page,
                ..Default::default()
            };
            let collection = index.collection(&params, &ctx);
            for doc in collection.pages() {
                println!("{}\t{}", doc.route, doc.title);
            }
            Ok(())
        }
        Commands::Watch => watch::watch_blocking(&service),
    }
}

fn print_routes(index: &PageIndex) {
    let root = index.root().map_or("", |doc| doc.path.as_str());
    for (route, path) in index.routes() {
        let rel = path.strip_prefix(root).unwrap_or(path);
        println!("{route}\t{}", rel.trim_start_matches('/'));
    }
}

fn find(index: &PageIndex, route: &str) -> Result<()> {
    match index.dispatch(route)? {
        Dispatch::Found(doc) => {
            println!("{}\t{}", doc.route, doc.file.as_deref().unwrap_or(&doc.path));
        }
        Dispatch::Redirect(target) => println!("redirect\t{target}"),
        Dispatch::NotFound => println!("not found\t{route}"),
    }
    Ok(())
}
