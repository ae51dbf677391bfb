use celestial_catalog::{ConeSearch, ConeSearchParams, Registry, ScsClient};

fn main() -> anyhow::Result<()> {
    let name = std::env::args().nth(1).unwrap_or_else(|| "GAIA_DR3".to_string());

    let registry = Registry::builtin();
    let catalogue = registry.lookup(&name)?;
    let client = ScsClient::new()?;

    let params = ConeSearchParams::new(191.25, 25.0, 0.05);
    let table = client.cone_search(catalogue, &params)?;
    println!(
        "\n{} sources from {} within {:.2}° of ({:.3}, {:.3}):\n",
        table.len(),
        catalogue.name,
        params.radius_deg,
        params.ra_deg,
        params.dec_deg,
    );
    println!("{}", table.preview(20));

    Ok(())
}
