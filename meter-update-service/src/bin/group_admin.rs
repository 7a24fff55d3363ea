use anyhow::{bail, Context, Result};
use meter_update_service::{hierarchy::GroupHierarchyEngine, observability};
use metering_client::db::{MeterRegistry, PgGroupGraphStore, PgMeterRegistry};
use metering_client::domain::Group;
use sqlx::postgres::PgPoolOptions;
use std::{env, sync::Arc};

const USAGE: &str = "usage: group_admin <command> [args]
  create       <name>
  rename       <group> <new-name>
  adopt-group  <parent> <child>
  disown-group <parent> <child>
  adopt-meter  <group> <meter>
  disown-meter <group> <meter>
  delete       <group> [--cascade]
  show         <group>
groups and meters are addressed by name; DATABASE_URL overrides the config uri";

#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        bail!("{USAGE}");
    }

    let uri = match env::var("DATABASE_URL") {
        Ok(uri) => uri,
        Err(_) => meter_update_service::config::AppConfig::load()?.database.uri,
    };
    let pool = PgPoolOptions::new().max_connections(2).connect(&uri).await?;

    let registry = Arc::new(PgMeterRegistry::new(pool.clone()));
    let groups = Arc::new(PgGroupGraphStore::new(pool));
    let engine = GroupHierarchyEngine::new(groups, Arc::clone(&registry));

    match args[0].as_str() {
        "create" => {
            let name = one(&args)?;
            let group = engine.insert_group(Group::new(name)).await?;
            println!("created group '{}' with id {}", group.name, group.id.unwrap_or(-1));
        }
        "rename" => {
            let [group, new_name] = two(&args)?;
            let id = group_id(&engine, group).await?;
            engine.rename_group(id, new_name).await?;
            println!("renamed '{group}' to '{new_name}'");
        }
        "adopt-group" => {
            let [parent, child] = two(&args)?;
            engine
                .adopt_group(group_id(&engine, parent).await?, group_id(&engine, child).await?)
                .await?;
            println!("'{parent}' now contains group '{child}'");
        }
        "disown-group" => {
            let [parent, child] = two(&args)?;
            engine
                .disown_group(group_id(&engine, parent).await?, group_id(&engine, child).await?)
                .await?;
            println!("'{parent}' no longer contains group '{child}'");
        }
        "adopt-meter" => {
            let [group, meter] = two(&args)?;
            engine
                .adopt_meter(group_id(&engine, group).await?, meter_id(&registry, meter).await?)
                .await?;
            println!("'{group}' now contains meter '{meter}'");
        }
        "disown-meter" => {
            let [group, meter] = two(&args)?;
            engine
                .disown_meter(group_id(&engine, group).await?, meter_id(&registry, meter).await?)
                .await?;
            println!("'{group}' no longer contains meter '{meter}'");
        }
        "delete" => {
            let name = args.get(1).map(String::as_str).context(USAGE)?;
            let cascade = args.iter().any(|a| a == "--cascade");
            engine.delete_group(group_id(&engine, name).await?, cascade).await?;
            println!("deleted group '{name}'");
        }
        "show" => {
            let name = one(&args)?;
            let id = group_id(&engine, name).await?;

            println!("group '{name}' (id {id})");
            println!("  parents:");
            for parent in engine.parents(id).await? {
                println!("    {}", parent.name);
            }
            println!("  child groups:");
            for child in engine.immediate_groups(id).await? {
                println!("    {}", child.name);
            }
            println!("  child meters:");
            for meter in engine.immediate_meters(id).await? {
                println!("    {} ({})", meter.name, meter.meter_type);
            }
            println!("  deep meters:");
            for meter in engine.deep_meters(id).await? {
                println!("    {}", meter.name);
            }
        }
        other => bail!("unknown command '{other}'\n{USAGE}"),
    }

    Ok(())
}

fn two(args: &[String]) -> Result<[&str; 2]> {
    match (args.get(1), args.get(2)) {
        (Some(a), Some(b)) => Ok([a, b]),
        _ => bail!("{USAGE}"),
    }
}

fn one(args: &[String]) -> Result<&str> {
    match args.get(1) {
        Some(a) => Ok(a),
        None => bail!("{USAGE}"),
    }
}

async fn group_id<G, M>(engine: &GroupHierarchyEngine<G, M>, name: &str) -> Result<i64>
where
    G: metering_client::db::GroupGraphStore,
    M: MeterRegistry,
{
    let group = engine
        .get_group_by_name(name)
        .await?
        .with_context(|| format!("no group named '{name}'"))?;
    group.id.context("group row without id")
}

async fn meter_id(registry: &PgMeterRegistry, name: &str) -> Result<i64> {
    let meter = registry
        .get_by_name(name)
        .await?
        .with_context(|| format!("no meter named '{name}'"))?;
    meter.id.context("meter row without id")
}
