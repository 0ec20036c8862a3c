//! Package handlers.

use tabled::Tabled;

use netbill_core::repository::PackageRepository;
use netbill_core::{NewPackage, Package, PackageId, PackageStatus, Registry};

use crate::cli::{GlobalOpts, PackageArgs, PackageCommand};
use crate::config::Context;
use crate::error::CliError;
use crate::output;

use super::util;

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Bandwidth")]
    bandwidth: String,
    #[tabled(rename = "Status")]
    status: String,
}

impl From<&Package> for PackageRow {
    fn from(p: &Package) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name.clone(),
            price: p.price.to_string(),
            bandwidth: output::or_dash(p.bandwidth_label.as_deref()),
            status: p.status.to_string(),
        }
    }
}

pub async fn handle(ctx: &Context, args: PackageArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let registry = Registry::new(ctx.store.clone());

    match args.command {
        PackageCommand::Add {
            name,
            price,
            bandwidth,
            description,
            inactive,
        } => {
            let package = registry
                .add_package(NewPackage {
                    name,
                    price: util::parse_amount("price", &price)?,
                    bandwidth_label: bandwidth,
                    description,
                    status: if inactive {
                        PackageStatus::Inactive
                    } else {
                        PackageStatus::Active
                    },
                })
                .await?;
            ctx.save()?;
            let out = output::render_list(
                &global.output,
                std::slice::from_ref(&package),
                |p| PackageRow::from(p),
                |p| p.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        PackageCommand::Delete { package } => {
            if !util::confirm(&format!("Delete package {package}?"), global.yes)? {
                return Ok(());
            }
            registry.delete_package(PackageId::new(package)).await?;
            ctx.save()?;
            util::note(&format!("Package {package} deleted"), global.quiet);
            Ok(())
        }

        PackageCommand::List => {
            let packages = ctx.store.list_packages().await?;
            let out = output::render_list(
                &global.output,
                &packages,
                |p| PackageRow::from(p),
                |p| p.id.to_string(),
            )?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
    }
}
