//! Receipt

use std::{fmt::Write, io, ops::Range};

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, MoneyError, iso::Currency};
use slotmap::SlotMap;
use smallvec::{SmallVec, smallvec};
use tabled::{
    builder::Builder,
    grid::config::HorizontalLine,
    settings::{
        Alignment, Color, Style, Theme,
        object::{Columns, Rows},
    },
};
use thiserror::Error;

use crate::{
    basket::Basket,
    pricing::TotalPriceError,
    products::{Product, ProductKey},
    rules::RuleKey,
};

/// Errors that can occur when building a receipt.
#[derive(Debug, Error)]
pub enum ReceiptError {
    /// Error calculating total price from basket lines.
    #[error(transparent)]
    TotalPrice(#[from] TotalPriceError),

    /// Wrapper for money errors.
    #[error(transparent)]
    Money(#[from] MoneyError),

    /// The basket has not been through fee evaluation.
    #[error("basket fees have not been evaluated")]
    NotEvaluated,

    /// Error finding a product in the product catalog.
    #[error("Missing product")]
    MissingProduct(ProductKey),

    /// IO error
    #[error("IO error")]
    IO,
}

/// One basket line as shown on the receipt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReceiptLine<'a> {
    /// Product on the line
    pub product: ProductKey,

    /// Number of units
    pub quantity: u32,

    /// Unit effective price
    pub unit_price: Money<'a, Currency>,

    /// Unit price times quantity
    pub line_price: Money<'a, Currency>,

    /// Fee charged against this line
    pub fee_amount: Money<'a, Currency>,

    /// Units charged a fee
    pub fee_quantity: u32,
}

/// One rule's fees as shown on the receipt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptFee<'a> {
    /// Rule that charged the fee
    pub rule: RuleKey,

    /// Rule name
    pub name: String,

    /// Description of the charge
    pub description: String,

    /// Number of applications
    pub frequency: u32,

    /// Total charged
    pub amount: Money<'a, Currency>,
}

/// Fee breakdown for an evaluated basket.
#[derive(Debug, Clone)]
pub struct Receipt<'a> {
    /// Basket lines with their fee annotations
    lines: SmallVec<[ReceiptLine<'a>; 10]>,

    /// Rules that charged a fee, in application order
    fees: SmallVec<[ReceiptFee<'a>; 4]>,

    /// Total cost before fees
    subtotal: Money<'a, Currency>,

    /// Sum of every fee
    total_fees: Money<'a, Currency>,

    /// Amount payable including fees
    total: Money<'a, Currency>,

    /// Currency used for all monetary values
    currency: &'static Currency,
}

impl<'a> Receipt<'a> {
    /// Build a receipt from an evaluated basket.
    ///
    /// # Errors
    ///
    /// - [`ReceiptError::NotEvaluated`] if the basket has no fee ledger.
    /// - [`ReceiptError::TotalPrice`] if a line or basket total cannot be calculated.
    pub fn from_basket(basket: &Basket<'a>) -> Result<Self, ReceiptError> {
        let applications = basket
            .fee_applications()
            .ok_or(ReceiptError::NotEvaluated)?;

        let lines = basket
            .iter()
            .map(|line| {
                Ok(ReceiptLine {
                    product: line.product(),
                    quantity: line.quantity(),
                    unit_price: *line.unit_effective_price(),
                    line_price: line.line_price()?,
                    fee_amount: *line.fee_amount(),
                    fee_quantity: line.fee_quantity(),
                })
            })
            .collect::<Result<_, ReceiptError>>()?;

        let fees = applications
            .fees()
            .map(|application| ReceiptFee {
                rule: application.rule,
                name: application.name.clone(),
                description: application.description.clone(),
                frequency: application.frequency,
                amount: application.amount,
            })
            .collect();

        Ok(Receipt {
            lines,
            fees,
            subtotal: basket.subtotal()?,
            total_fees: *basket.total_fees(),
            total: basket.total_with_fees()?,
            currency: basket.currency(),
        })
    }

    /// Basket lines with their fee annotations
    #[must_use]
    pub fn lines(&self) -> &[ReceiptLine<'a>] {
        &self.lines
    }

    /// Rules that charged a fee, in application order
    #[must_use]
    pub fn fees(&self) -> &[ReceiptFee<'a>] {
        &self.fees
    }

    /// Total cost before fees
    #[must_use]
    pub fn subtotal(&self) -> Money<'a, Currency> {
        self.subtotal
    }

    /// Sum of every fee
    #[must_use]
    pub fn total_fees(&self) -> Money<'a, Currency> {
        self.total_fees
    }

    /// Amount payable including fees
    #[must_use]
    pub fn total(&self) -> Money<'a, Currency> {
        self.total
    }

    /// Currency used for all monetary values.
    #[must_use]
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Fees as a share of the subtotal.
    pub fn fee_percent(&self) -> Percentage {
        let fees_minor = self.total_fees.to_minor_units();
        let subtotal_minor = self.subtotal.to_minor_units();

        if subtotal_minor == 0 {
            return Percentage::from(0.0);
        }

        let fees_dec = Decimal::from_i64(fees_minor).unwrap_or(Decimal::ZERO);
        let subtotal_dec = Decimal::from_i64(subtotal_minor).unwrap_or(Decimal::ZERO);

        Percentage::from(fees_dec / subtotal_dec)
    }

    /// Prints the receipt to the console.
    ///
    /// # Errors
    ///
    /// Returns an error if a product is missing or the receipt cannot be written.
    pub fn write_to(
        &self,
        mut out: impl io::Write,
        product_meta: &SlotMap<ProductKey, Product<'_>>,
    ) -> Result<(), ReceiptError> {
        let mut builder = Builder::default();
        let mut color_ops: SmallVec<[(usize, usize, Color); 32]> = smallvec![];

        push_line_header(&mut builder);
        append_line_rows(self, product_meta, &mut builder, &mut color_ops)?;

        write_table(&mut out, builder, 3..7, color_ops)?;

        if !self.fees.is_empty() {
            let mut builder = Builder::default();
            let mut color_ops: SmallVec<[(usize, usize, Color); 32]> = smallvec![];

            push_fee_header(&mut builder);
            append_fee_rows(self, &mut builder, &mut color_ops);

            write_table(&mut out, builder, 2..4, color_ops)?;
        }

        write_receipt_summary(&mut out, self)?;

        Ok(())
    }
}

fn push_line_header(builder: &mut Builder) {
    builder.push_record([
        "",
        "Item",
        "Tags",
        "Qty",
        "Unit Price",
        "Line Price",
        "Fee",
        "Units Charged",
    ]);
}

fn push_fee_header(builder: &mut Builder) {
    builder.push_record(["", "Fee", "Applications", "Amount", "Description"]);
}

fn append_line_rows(
    receipt: &Receipt<'_>,
    product_meta: &SlotMap<ProductKey, Product<'_>>,
    builder: &mut Builder,
    color_ops: &mut SmallVec<[(usize, usize, Color); 32]>,
) -> Result<(), ReceiptError> {
    for (idx, line) in receipt.lines.iter().enumerate() {
        let (product_name, product_tags) = product_display(line.product, product_meta)?;
        let row = idx + 1; // header is row 0
        let charged = line.fee_quantity > 0;

        let (fee, units_charged) = if charged {
            (format!("{}", line.fee_amount), line.fee_quantity.to_string())
        } else {
            (String::new(), String::new())
        };

        builder.push_record([
            format!("#{:<3}", idx + 1),
            product_name,
            product_tags,
            line.quantity.to_string(),
            format!("{}", line.unit_price),
            format!("{}", line.line_price),
            fee,
            units_charged,
        ]);

        color_ops.push((row, 2, color_dark_grey()));
        color_ops.push((row, 4, color_dark_grey()));

        if charged {
            color_ops.push((row, 6, Color::FG_YELLOW));
        }
    }

    Ok(())
}

fn append_fee_rows(
    receipt: &Receipt<'_>,
    builder: &mut Builder,
    color_ops: &mut SmallVec<[(usize, usize, Color); 32]>,
) {
    for (idx, fee) in receipt.fees.iter().enumerate() {
        let row = idx + 1;

        builder.push_record([
            format!("#{:<3}", idx + 1),
            fee.name.clone(),
            fee.frequency.to_string(),
            format!("{}", fee.amount),
            fee.description.clone(),
        ]);

        color_ops.push((row, 3, Color::FG_YELLOW));
        color_ops.push((row, 4, color_dark_grey()));
    }
}

fn product_display(
    product_key: ProductKey,
    product_meta: &SlotMap<ProductKey, Product<'_>>,
) -> Result<(String, String), ReceiptError> {
    let product = product_meta
        .get(product_key)
        .ok_or(ReceiptError::MissingProduct(product_key))?;

    Ok((product.name.clone(), product.tags.join("\n")))
}

fn write_table(
    out: &mut impl io::Write,
    builder: Builder,
    money_columns: Range<usize>,
    color_ops: SmallVec<[(usize, usize, Color); 32]>,
) -> Result<(), ReceiptError> {
    let mut table = builder.build();
    let mut theme = Theme::from(Style::modern_rounded());
    let separator = HorizontalLine::new(Some('─'), Some('┼'), Some('├'), Some('┤'));

    theme.remove_horizontal_lines();
    theme.insert_horizontal_line(1, separator);

    table.with(theme);
    table.modify(Rows::first(), Color::BOLD);
    table.modify(Columns::new(money_columns), Alignment::right());

    for (row, col, color) in color_ops {
        table.modify((row, col), color);
    }

    let table_str = colorize_borders(&table.to_string());

    writeln!(out, "\n{table_str}").map_err(|_err| ReceiptError::IO)
}

fn write_receipt_summary(
    out: &mut impl io::Write,
    receipt: &Receipt<'_>,
) -> Result<(), ReceiptError> {
    let fee_percent_points = percent_points_from_fractional_percentage(receipt.fee_percent());

    let subtotal_label = " Subtotal:";
    let fees_label = " Fees:";
    let total_label = " \x1b[1mTotal:\x1b[0m";

    let subtotal_val = format!("{}  ", receipt.subtotal());
    let fees_val = format!("({fee_percent_points:.2}%) {}  ", receipt.total_fees());
    let total_val = format!("{}  ", receipt.total());

    let label_width = visible_width(subtotal_label)
        .max(visible_width(fees_label))
        .max(visible_width(total_label));

    let value_width = subtotal_val.len().max(fees_val.len()).max(total_val.len());

    write_summary_line(out, subtotal_label, &subtotal_val, label_width, value_width)?;
    write_summary_line(out, fees_label, &fees_val, label_width, value_width)?;

    write_summary_line(
        out,
        total_label,
        &format!("\x1b[1m{total_val}\x1b[0m"),
        label_width,
        value_width,
    )?;

    writeln!(out).map_err(|_err| ReceiptError::IO)
}

/// Converts a fractional percentage to percent points for display.
fn percent_points_from_fractional_percentage(percentage: Percentage) -> Decimal {
    // `Percentage` is a fraction (e.g. 0.25), so multiply by 100 to print percent points.
    ((percentage * Decimal::ONE) * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Wraps runs of UTF-8 box-drawing characters in ANSI dark-grey escape codes.
///
/// Box-drawing characters occupy the Unicode range U+2500..U+257F.
fn colorize_borders(table: &str) -> String {
    let mut out = String::with_capacity(table.len() + 256);
    let mut in_run = false;

    for ch in table.chars() {
        let box_char = ('\u{2500}'..='\u{257F}').contains(&ch);

        if box_char && !in_run {
            _ = out.write_str("\x1b[90m");
            in_run = true;
        } else if !box_char && in_run {
            _ = out.write_str("\x1b[0m");
            in_run = false;
        }

        out.push(ch);
    }

    if in_run {
        _ = out.write_str("\x1b[0m");
    }

    out
}

/// Returns the visible (non-ANSI) width of a string.
fn visible_width(s: &str) -> usize {
    let mut width = 0usize;
    let mut in_escape = false;

    for ch in s.chars() {
        if in_escape {
            if ch.is_ascii_alphabetic() {
                in_escape = false;
            }
        } else if ch == '\x1b' {
            in_escape = true;
        } else {
            width += 1;
        }
    }

    width
}

/// Writes a summary line with a right-aligned label and a fixed-width value column.
fn write_summary_line(
    out: &mut impl io::Write,
    label: &str,
    value: &str,
    label_col_width: usize,
    value_col_width: usize,
) -> Result<(), ReceiptError> {
    let label_pad = label_col_width.saturating_sub(visible_width(label));
    let value_pad = value_col_width.saturating_sub(visible_width(value));

    writeln!(
        out,
        "{:>label_pad$}{label}  {value_pad}{value}",
        "",
        value_pad = " ".repeat(value_pad)
    )
    .map_err(|_err| ReceiptError::IO)
}

/// ANSI dark grey foreground.
fn color_dark_grey() -> Color {
    Color::new("\x1b[90m", "\x1b[0m")
}
