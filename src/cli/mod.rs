use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::{
    AddItem, ItemWithStock, LineChange, LineQuantityUpdate, RetailService, SaleDetail,
};
use crate::config::Settings;
use crate::domain::{
    CashDirection, CashEffect, Expense, ItemId, ItemPrices, ItemRef, ItemUpdate, NewExpense,
    NewItem, NewSale, PriceTier, SaleLine, SaleTarget, StockDirection, Unit, format_cents,
    parse_cents,
};
use crate::telemetry::init_tracing;

/// Retail Ledger - stock, sales and cash register bookkeeping
#[derive(Parser)]
#[command(name = "retail-ledger")]
#[command(about = "Stock, sale and cash register ledgers for a retail/wholesale shop")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the configured one)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Catalog management commands
    #[command(subcommand)]
    Item(ItemCommands),

    /// Stock figures and quantity changes
    #[command(subcommand)]
    Stock(StockCommands),

    /// Sale and sale line commands
    #[command(subcommand)]
    Sale(SaleCommands),

    /// Expense commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Cash register commands
    #[command(subcommand)]
    Register(RegisterCommands),

    /// Export data to CSV or JSON
    Export {
        /// What to export: stock, history
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,

        /// Format: csv, json (json is only available for stock)
        #[arg(short, long, default_value = "csv")]
        format: String,
    },
}

/// Catalog fields shared by create and update. Prices are per carton.
#[derive(clap::Args)]
pub struct CatalogArgs {
    /// Item name
    name: String,

    /// Barcode
    #[arg(short, long)]
    barcode: Option<String>,

    /// Singles per carton
    #[arg(long, default_value = "1")]
    per_carton: i64,

    /// Retail price of a carton sold whole (e.g., "120.00")
    #[arg(long, default_value = "0")]
    retail: String,

    /// Retail price of a carton sold by the single
    #[arg(long)]
    single_retail: Option<String>,

    /// Wholesale price of a carton sold whole
    #[arg(long, default_value = "0")]
    wholesale: String,

    /// Wholesale price of a carton sold by the single
    #[arg(long)]
    single_wholesale: Option<String>,

    /// Cost of a carton
    #[arg(long, default_value = "0")]
    cost: String,
}

impl CatalogArgs {
    fn prices(&self) -> Result<(ItemPrices, i64)> {
        let retail = parse_money(&self.retail)?;
        let wholesale = parse_money(&self.wholesale)?;
        let single_retail = self
            .single_retail
            .as_deref()
            .map(parse_money)
            .transpose()?
            .unwrap_or(retail);
        let single_wholesale = self
            .single_wholesale
            .as_deref()
            .map(parse_money)
            .transpose()?
            .unwrap_or(wholesale);

        Ok((
            ItemPrices {
                plural_retail: retail,
                single_retail,
                plural_wholesale: wholesale,
                single_wholesale,
            },
            parse_money(&self.cost)?,
        ))
    }
}

#[derive(Subcommand)]
pub enum ItemCommands {
    /// Create a new item
    Create {
        #[command(flatten)]
        catalog: CatalogArgs,

        /// Initial stock, in cartons
        #[arg(long, default_value = "0")]
        cartons: i64,
    },

    /// Update catalog fields and prices (stock is left alone)
    Update {
        /// Item ID
        id: ItemId,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Show one item by ID or barcode
    Show {
        /// Item ID
        id: Option<ItemId>,

        /// Look the item up by barcode instead
        #[arg(short, long)]
        barcode: Option<String>,
    },

    /// List all items with stock
    List,
}

#[derive(Subcommand)]
pub enum StockCommands {
    /// Show stock figures for an item
    Show {
        /// Item ID
        item_id: ItemId,
    },

    /// Increase or decrease stock
    Change {
        /// Item ID
        item_id: ItemId,

        /// Direction: increase, decrease
        direction: String,

        /// Amount, in the chosen unit
        amount: i64,

        /// Unit: carton, single
        #[arg(short, long, default_value = "carton")]
        unit: String,
    },
}

/// Header fields for a new or edited sale.
#[derive(clap::Args)]
pub struct HeaderArgs {
    /// Customer ID
    #[arg(long, default_value = "0")]
    customer: i64,

    /// Sales agent ID
    #[arg(long)]
    mandub: Option<i64>,

    /// Sell on credit
    #[arg(long)]
    credit: bool,

    /// Discount on the whole sale (e.g., "5.00")
    #[arg(long, default_value = "0")]
    discount: String,
}

impl HeaderArgs {
    fn to_header(&self) -> Result<NewSale> {
        Ok(NewSale {
            customer_id: self.customer,
            mandub_id: self.mandub,
            dept: self.credit,
            discount: parse_money(&self.discount)?,
        })
    }
}

#[derive(Subcommand)]
pub enum SaleCommands {
    /// Open an empty sale
    Create {
        #[command(flatten)]
        header: HeaderArgs,
    },

    /// Edit a sale header
    Update {
        /// Sale ID
        sale_id: i64,

        #[command(flatten)]
        header: HeaderArgs,
    },

    /// Add one carton or one single of an item to a sale
    Add {
        /// Sale ID (0 opens a new sale)
        sale_id: i64,

        /// Item ID
        #[arg(long, conflicts_with = "barcode", required_unless_present = "barcode")]
        item: Option<ItemId>,

        /// Item barcode
        #[arg(short, long)]
        barcode: Option<String>,

        /// Unit: carton, single
        #[arg(short, long, default_value = "carton")]
        unit: String,

        /// Price tier: plural-retail, single-retail, plural-wholesale, single-wholesale
        #[arg(short, long, default_value = "plural-retail")]
        tier: String,

        #[command(flatten)]
        header: HeaderArgs,
    },

    /// Grow a line by one unit
    Increase {
        /// Line ID
        line_id: i64,

        #[arg(short, long, default_value = "carton")]
        unit: String,
    },

    /// Shrink a line by one unit
    Decrease {
        /// Line ID
        line_id: i64,

        #[arg(short, long, default_value = "carton")]
        unit: String,
    },

    /// Set a line to an absolute quantity
    SetQty {
        /// Line ID
        line_id: i64,

        /// Quantity, in the chosen unit
        quantity: i64,

        #[arg(short, long, default_value = "carton")]
        unit: String,
    },

    /// Reprice a line (price per single)
    SetPrice {
        /// Line ID
        line_id: i64,

        /// New price (e.g., "12.50")
        price: String,
    },

    /// Remove a line from its sale
    RemoveLine {
        /// Line ID
        line_id: i64,
    },

    /// Put a removed line back
    RestoreLine {
        /// Line ID
        line_id: i64,
    },

    /// Delete a sale and all its lines
    Delete {
        /// Sale ID
        sale_id: i64,
    },

    /// Restore a deleted sale
    Restore {
        /// Sale ID
        sale_id: i64,

        /// Items whose lines come back active (comma-separated IDs)
        #[arg(long, value_delimiter = ',')]
        items: Vec<ItemId>,
    },

    /// Show a sale with its lines and totals
    Show {
        /// Sale ID
        sale_id: i64,

        /// Include removed lines
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense
    Create {
        /// Title
        title: String,

        /// Price (e.g., "50.00")
        price: String,

        /// Pay it out of the cash register
        #[arg(long)]
        from_case: bool,
    },

    /// Replace an expense's title, price and payment source
    Update {
        /// Expense ID
        id: i64,

        /// Title
        title: String,

        /// Price
        price: String,

        /// Pay it out of the cash register
        #[arg(long)]
        from_case: bool,
    },

    /// Delete an expense (refunds the register)
    Delete {
        /// Expense ID
        id: i64,
    },

    /// Restore a deleted expense
    Restore {
        /// Expense ID
        id: i64,
    },

    /// Show one expense with its register history
    Show {
        /// Expense ID
        id: i64,
    },

    /// List expenses
    List {
        /// Include deleted expenses
        #[arg(short, long)]
        all: bool,
    },
}

#[derive(Subcommand)]
pub enum RegisterCommands {
    /// Show the register balance
    Show,

    /// Show register history
    History {
        /// Include deleted rows
        #[arg(short, long)]
        all: bool,
    },

    /// Put money into the register
    Deposit {
        /// Amount (e.g., "500.00")
        amount: String,

        #[arg(short, long)]
        note: Option<String>,
    },

    /// Take money out of the register
    Withdraw {
        /// Amount
        amount: String,

        #[arg(short, long)]
        note: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut settings = Settings::load().context("Failed to load settings")?;
        if let Some(path) = &self.database {
            settings.database.path = path.clone();
        }
        let level = if self.verbose {
            "debug"
        } else {
            settings.log.level.as_str()
        };
        init_tracing(level)?;

        let db = &settings.database;
        match self.command {
            Commands::Init => {
                let service = RetailService::init(db).await?;
                service.close().await;
                println!("Database initialized: {}", db.path);
            }

            Commands::Item(cmd) => {
                let service = RetailService::connect(db).await?;
                run_item_command(&service, cmd).await?;
            }

            Commands::Stock(cmd) => {
                let service = RetailService::connect(db).await?;
                run_stock_command(&service, cmd).await?;
            }

            Commands::Sale(cmd) => {
                let service = RetailService::connect(db).await?;
                run_sale_command(&service, cmd).await?;
            }

            Commands::Expense(cmd) => {
                let service = RetailService::connect(db).await?;
                run_expense_command(&service, cmd).await?;
            }

            Commands::Register(cmd) => {
                let service = RetailService::connect(db).await?;
                run_register_command(&service, cmd).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
            } => {
                let service = RetailService::connect(db).await?;
                run_export_command(&service, &export_type, output.as_deref(), &format).await?;
            }
        }

        Ok(())
    }
}

async fn run_item_command(service: &RetailService, cmd: ItemCommands) -> Result<()> {
    match cmd {
        ItemCommands::Create { catalog, cartons } => {
            let (carton_prices, carton_produce_price) = catalog.prices()?;
            let created = service
                .create_item(NewItem {
                    name: catalog.name,
                    barcode: catalog.barcode,
                    cartons,
                    item_per_cartoon: catalog.per_carton,
                    carton_prices,
                    carton_produce_price,
                })
                .await?;
            println!(
                "Created item: {} ({}), {} in stock",
                created.item.name, created.item.id, created.stock.quantity
            );
        }

        ItemCommands::Update { id, catalog } => {
            let (carton_prices, carton_produce_price) = catalog.prices()?;
            let updated = service
                .update_item(
                    id,
                    ItemUpdate {
                        name: catalog.name,
                        barcode: catalog.barcode,
                        item_per_cartoon: catalog.per_carton,
                        carton_prices,
                        carton_produce_price,
                    },
                )
                .await?;
            println!("Updated item: {} ({})", updated.item.name, updated.item.id);
        }

        ItemCommands::Show { id, barcode } => {
            let entry = match (id, barcode) {
                (Some(id), _) => service.get_item(id).await?,
                (None, Some(barcode)) => service.find_item_by_barcode(&barcode).await?,
                (None, None) => anyhow::bail!("Give an item ID or --barcode"),
            };
            print_item(&entry);
        }

        ItemCommands::List => {
            let entries = service.list_items().await?;
            if entries.is_empty() {
                println!("No items found.");
            } else {
                println!(
                    "{:<6} {:<24} {:>10} {:>8} {:>10} {:>10}",
                    "ID", "NAME", "QUANTITY", "CARTON", "FREE", "RETAIL"
                );
                println!("{}", "-".repeat(73));
                for entry in entries {
                    println!(
                        "{:<6} {:<24} {:>10} {:>8} {:>10} {:>10}",
                        entry.item.id,
                        truncate(&entry.item.name, 24),
                        entry.stock.quantity,
                        entry.stock.item_per_cartoon,
                        entry.stock.actual_quantity,
                        format_cents(entry.item.prices.single_retail)
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_stock_command(service: &RetailService, cmd: StockCommands) -> Result<()> {
    match cmd {
        StockCommands::Show { item_id } => {
            let stock = service.item_stock(item_id).await?;
            println!("Item {}", stock.item_id);
            println!("  Quantity:       {}", stock.quantity);
            println!("  Per carton:     {}", stock.item_per_cartoon);
            println!("  Free to sell:   {}", stock.actual_quantity);
            println!("  Committed:      {}", stock.committed());
        }

        StockCommands::Change {
            item_id,
            direction,
            amount,
            unit,
        } => {
            let direction = StockDirection::from_str(&direction).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid direction '{}'. Valid directions: increase, decrease",
                    direction
                )
            })?;
            let updated = service
                .change_quantity(item_id, direction, parse_unit(&unit)?, amount)
                .await?;
            println!(
                "Stock of {} is now {} ({} free)",
                updated.item.name, updated.stock.quantity, updated.stock.actual_quantity
            );
        }
    }
    Ok(())
}

async fn run_sale_command(service: &RetailService, cmd: SaleCommands) -> Result<()> {
    match cmd {
        SaleCommands::Create { header } => {
            let sale = service.create_sale(header.to_header()?).await?;
            println!("Created sale: {}", sale.id);
        }

        SaleCommands::Update { sale_id, header } => {
            let sale = service.update_sale(sale_id, header.to_header()?).await?;
            println!(
                "Updated sale {} (discount {})",
                sale.id,
                format_cents(sale.discount)
            );
        }

        SaleCommands::Add {
            sale_id,
            item,
            barcode,
            unit,
            tier,
            header,
        } => {
            let sale = if sale_id == 0 {
                SaleTarget::New(header.to_header()?)
            } else {
                SaleTarget::Existing(sale_id)
            };
            let item = match (item, barcode) {
                (Some(id), _) => ItemRef::Id(id),
                (None, Some(barcode)) => ItemRef::Barcode(barcode),
                (None, None) => anyhow::bail!("Give --item or --barcode"),
            };
            let tier = PriceTier::from_str(&tier).ok_or_else(|| {
                anyhow::anyhow!(
                    "Invalid tier '{}'. Valid tiers: plural-retail, single-retail, plural-wholesale, single-wholesale",
                    tier
                )
            })?;

            let outcome = service
                .add_item_to_sale(AddItem {
                    sale,
                    item,
                    unit: parse_unit(&unit)?,
                    tier,
                })
                .await?;

            if outcome.sale_created {
                println!("Opened sale: {}", outcome.sale.id);
            }
            let verb = match outcome.change {
                LineChange::Inserted => "Added",
                LineChange::Increased => "Increased",
                LineChange::Restored => "Restored",
            };
            println!(
                "{} line {}: {} x {} = {}",
                verb,
                outcome.line.id,
                outcome.line.quantity,
                format_cents(outcome.line.item_sell_price),
                format_cents(outcome.line.total())
            );
        }

        SaleCommands::Increase { line_id, unit } => {
            let update = service.increase_line(line_id, parse_unit(&unit)?).await?;
            print_quantity_update(&update);
        }

        SaleCommands::Decrease { line_id, unit } => {
            let update = service.decrease_line(line_id, parse_unit(&unit)?).await?;
            print_quantity_update(&update);
        }

        SaleCommands::SetQty {
            line_id,
            quantity,
            unit,
        } => {
            let update = service
                .set_line_quantity(line_id, parse_unit(&unit)?, quantity)
                .await?;
            print_quantity_update(&update);
        }

        SaleCommands::SetPrice { line_id, price } => {
            let update = service.set_line_price(line_id, parse_money(&price)?).await?;
            println!(
                "Line {} repriced: {} -> {}",
                update.line.id,
                format_cents(update.total_before),
                format_cents(update.total_after)
            );
            print_cash_effect(update.cash_effect);
        }

        SaleCommands::RemoveLine { line_id } => {
            let line = service.remove_line(line_id).await?;
            println!("Line {} is {}", line.id, line.state);
        }

        SaleCommands::RestoreLine { line_id } => {
            let line = service.restore_line(line_id).await?;
            println!("Line {} is {}", line.id, line.state);
        }

        SaleCommands::Delete { sale_id } => {
            let detail = service.delete_sale(sale_id).await?;
            println!(
                "Deleted sale {} ({} lines)",
                detail.sale.id,
                detail.lines.len()
            );
        }

        SaleCommands::Restore { sale_id, items } => {
            let detail = service.restore_sale(sale_id, &items).await?;
            print_sale(&detail, true);
        }

        SaleCommands::Show { sale_id, all } => {
            let detail = service.get_sale(sale_id).await?;
            print_sale(&detail, all);
        }
    }
    Ok(())
}

async fn run_expense_command(service: &RetailService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Create {
            title,
            price,
            from_case,
        } => {
            let expense = service
                .create_expense(NewExpense {
                    title,
                    price: parse_money(&price)?,
                    from_case,
                })
                .await?;
            println!(
                "Recorded expense {}: {} ({})",
                expense.id,
                expense.title,
                format_cents(expense.price)
            );
        }

        ExpenseCommands::Update {
            id,
            title,
            price,
            from_case,
        } => {
            let expense = service
                .update_expense(
                    id,
                    NewExpense {
                        title,
                        price: parse_money(&price)?,
                        from_case,
                    },
                )
                .await?;
            println!(
                "Updated expense {}: {} ({})",
                expense.id,
                expense.title,
                format_cents(expense.price)
            );
        }

        ExpenseCommands::Delete { id } => {
            let expense = service.delete_expense(id).await?;
            println!("Deleted expense {}", expense.id);
        }

        ExpenseCommands::Restore { id } => {
            let expense = service.restore_expense(id).await?;
            println!("Restored expense {}", expense.id);
        }

        ExpenseCommands::Show { id } => {
            let expense = service.get_expense(id).await?;
            print_expense_row(&expense);
            for entry in service.expense_history(id).await? {
                println!(
                    "  {} {} {}{}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.situation.as_str(),
                    format_cents(entry.money),
                    if entry.deleted { " (deleted)" } else { "" }
                );
            }
        }

        ExpenseCommands::List { all } => {
            let expenses = service.list_expenses(all).await?;
            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                println!(
                    "{:<6} {:<30} {:>12} {:<10} {:<8}",
                    "ID", "TITLE", "PRICE", "SOURCE", "STATUS"
                );
                println!("{}", "-".repeat(70));
                for expense in &expenses {
                    print_expense_row(expense);
                }
            }
        }
    }
    Ok(())
}

async fn run_register_command(service: &RetailService, cmd: RegisterCommands) -> Result<()> {
    match cmd {
        RegisterCommands::Show => {
            let register = service.register().await?;
            println!("Register balance: {}", format_cents(register.money));
        }

        RegisterCommands::History { all } => {
            let history = service.register_history(all).await?;
            if history.is_empty() {
                println!("No register history.");
            } else {
                println!(
                    "{:<6} {:<17} {:<11} {:<9} {:>12} {:<8}",
                    "ID", "DATE", "TYPE", "DIRECTION", "AMOUNT", "EXPENSE"
                );
                println!("{}", "-".repeat(68));
                for entry in history {
                    println!(
                        "{:<6} {:<17} {:<11} {:<9} {:>12} {:<8}{}",
                        entry.id,
                        entry.created_at.format("%Y-%m-%d %H:%M"),
                        entry.kind.as_str(),
                        entry.situation.as_str(),
                        format_cents(entry.money),
                        entry.expense_id.map(|id| id.to_string()).unwrap_or_default(),
                        if entry.deleted { " (deleted)" } else { "" }
                    );
                }
            }
        }

        RegisterCommands::Deposit { amount, note } => {
            let register = service
                .deposit(parse_money(&amount)?, note.as_deref())
                .await?;
            println!("Register balance: {}", format_cents(register.money));
        }

        RegisterCommands::Withdraw { amount, note } => {
            let register = service
                .withdraw(parse_money(&amount)?, note.as_deref())
                .await?;
            println!("Register balance: {}", format_cents(register.money));
        }
    }
    Ok(())
}

async fn run_export_command(
    service: &RetailService,
    export_type: &str,
    output: Option<&str>,
    format: &str,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match (export_type, format) {
        ("stock", "csv") => {
            let count = exporter.export_stock_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} items", count);
            }
        }
        ("stock", "json") => {
            let snapshot = exporter.export_stock_json(writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {} items, register at {}",
                    snapshot.items.len(),
                    format_cents(snapshot.register.money)
                );
            }
        }
        ("history", "csv") => {
            let count = exporter.export_register_history_csv(writer).await?;
            if output.is_some() {
                eprintln!("Exported {} history rows", count);
            }
        }
        _ => {
            anyhow::bail!(
                "Invalid export '{} as {}'. Valid exports: stock (csv, json), history (csv)",
                export_type,
                format
            );
        }
    }

    Ok(())
}

fn print_item(entry: &ItemWithStock) {
    let item = &entry.item;
    println!("Item: {}", item.name);
    println!("  ID:               {}", item.id);
    if let Some(barcode) = &item.barcode {
        println!("  Barcode:          {}", barcode);
    }
    println!("  Per carton:       {}", item.item_per_cartoon);
    println!(
        "  Quantity:         {} ({} cartons)",
        entry.stock.quantity,
        item.cartons()
    );
    println!("  Free to sell:     {}", entry.stock.actual_quantity);
    println!();
    println!("  Prices per single:");
    println!("    Plural retail:    {}", format_cents(item.prices.plural_retail));
    println!("    Single retail:    {}", format_cents(item.prices.single_retail));
    println!(
        "    Plural wholesale: {}",
        format_cents(item.prices.plural_wholesale)
    );
    println!(
        "    Single wholesale: {}",
        format_cents(item.prices.single_wholesale)
    );
    println!("    Cost:             {}", format_cents(item.item_produce_price));
}

fn print_sale(detail: &SaleDetail, include_removed: bool) {
    let sale = &detail.sale;
    println!(
        "Sale {}{}",
        sale.id,
        if sale.deleted { " (deleted)" } else { "" }
    );
    println!("  Customer:   {}", sale.customer_id);
    if let Some(mandub) = sale.mandub_id {
        println!("  Agent:      {}", mandub);
    }
    println!("  Payment:    {}", if sale.dept { "credit" } else { "cash" });
    println!(
        "  Created:    {}",
        sale.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    println!();

    let lines: Vec<&SaleLine> = detail
        .lines
        .iter()
        .filter(|line| include_removed || line.state.is_active())
        .collect();
    if lines.is_empty() {
        println!("  No lines.");
    } else {
        println!(
            "  {:<6} {:<6} {:>8} {:>10} {:>12} {:<12}",
            "LINE", "ITEM", "QTY", "PRICE", "TOTAL", "STATE"
        );
        println!("  {}", "-".repeat(59));
        for line in lines {
            println!(
                "  {:<6} {:<6} {:>8} {:>10} {:>12} {:<12}",
                line.id,
                line.item_id,
                line.quantity,
                format_cents(line.item_sell_price),
                format_cents(line.total()),
                line.state.as_str()
            );
        }
    }
    println!();
    println!("  Subtotal:   {}", format_cents(detail.subtotal));
    println!("  Discount:   {}", format_cents(sale.discount));
    println!("  Total:      {}", format_cents(detail.total));
}

fn print_expense_row(expense: &Expense) {
    println!(
        "{:<6} {:<30} {:>12} {:<10} {:<8}",
        expense.id,
        truncate(&expense.title, 30),
        format_cents(expense.price),
        if expense.from_case { "register" } else { "external" },
        if expense.deleted { "deleted" } else { "live" }
    );
}

fn print_quantity_update(update: &LineQuantityUpdate) {
    println!(
        "Line {}: {} -> {} (total {})",
        update.line.id,
        update.previous_quantity,
        update.line.quantity,
        format_cents(update.line.total())
    );
    print_cash_effect(update.cash_effect);
}

fn print_cash_effect(effect: Option<CashEffect>) {
    if let Some(effect) = effect {
        let direction = match effect.direction {
            CashDirection::Increase => "due from customer",
            CashDirection::Decrease => "owed to customer",
        };
        println!("  {} {}", format_cents(effect.amount), direction);
    }
}

fn parse_unit(unit: &str) -> Result<Unit> {
    Unit::from_str(unit)
        .ok_or_else(|| anyhow::anyhow!("Invalid unit '{}'. Valid units: carton, single", unit))
}

fn parse_money(amount: &str) -> Result<i64> {
    parse_cents(amount).with_context(|| format!("Invalid amount '{}'. Use '50.00' or '50'", amount))
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
