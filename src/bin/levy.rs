//! Levy
//!
//! Evaluates the conditional fees for each basket in a fixture set and prints a
//! receipt per basket.
//!
//! Use `-f` to load a fixture set by name
//! Use `-b` to evaluate a single basket
//! Use `--at` to evaluate rule windows at a fixed instant
//! Use `-o` to record rule usage as if each basket were placed as an order

use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use levy::{
    checkout::{order_total, record_order_fees},
    fixtures::Fixture,
    receipt::Receipt,
    utils::EvaluateArgs,
};

/// Levy entry point
pub fn main() -> Result<()> {
    let args = EvaluateArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .with_writer(io::stderr)
        .init();

    let mut fixture = Fixture::from_set(&args.fixture)?;
    let applicator = args.applicator()?;
    let customer = args.customer();
    let session = args.session();

    let baskets: Vec<String> = match &args.basket {
        Some(name) => vec![name.clone()],
        None => fixture
            .basket_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };

    info!(fixture = %args.fixture, baskets = baskets.len(), "evaluating fixture baskets");

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    for name in baskets {
        let mut basket = fixture.basket(&name)?;

        applicator.apply(
            fixture.rules(),
            &mut basket,
            customer.as_ref(),
            session.as_ref(),
        )?;

        writeln!(handle, "\n\x1b[1m{name}\x1b[0m")?;

        Receipt::from_basket(&basket)?.write_to(&mut handle, fixture.product_meta_map())?;

        for rule in fixture.rules().iter() {
            if rule.is_condition_partially_satisfied(&basket)? {
                if let Some(message) = rule.upsell_message(&basket)? {
                    writeln!(handle, " {}: {message}", rule.name())?;
                }
            }
        }

        if let Some(order) = &args.order {
            let order_ref = format!("{order}-{name}");
            let total = order_total(&basket)?;
            let order_fees = record_order_fees(fixture.rules_mut(), &order_ref, &basket)?;

            writeln!(
                handle,
                " Recorded order {order_ref}: {} fee(s), total {total}",
                order_fees.len()
            )?;
        }
    }

    Ok(())
}
