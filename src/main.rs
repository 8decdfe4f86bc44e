//! Micro-loan engine CLI
//!
//! Command-line front end for scoring applicants, building repayment
//! schedules and running applicants through the loan lifecycle.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use microloan_engine::amortization::{build_schedule, compute_monthly_payment, total_repayment, ScheduleConfig, ScheduleMethod};
use microloan_engine::applicant::{load_applicants, Applicant, CreditHistory, EmploymentStatus, Financials, LoanRequest};
use microloan_engine::lending::{ApplicationStatus, LendingService};
use microloan_engine::notify::{Notifier, TemplateNotifier};
use microloan_engine::payments::{MobileMoneyFacade, PaymentGateway, SandboxProvider};
use microloan_engine::scoring::{explain, format_amount, CreditScorer};
use microloan_engine::store::Database;
use microloan_engine::Assumptions;

/// Micro-loan credit scoring and lending engine
#[derive(Parser)]
#[command(name = "microloan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory of assumption CSV files (built-in defaults when omitted)
    #[arg(long, global = true)]
    assumptions: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single applicant
    Score(ScoreArgs),

    /// Print a repayment schedule
    Schedule(ScheduleArgs),

    /// List loan products for a score and income
    Products {
        #[arg(long)]
        score: i32,
        #[arg(long)]
        income: f64,
    },

    /// Run an applicant file through the full lifecycle on a sandbox provider
    Process {
        /// Applicant CSV file
        #[arg(long, default_value = "data/applicants.csv")]
        applicants: PathBuf,
        /// SQLite database file
        #[arg(long, default_value = "microloan.db")]
        db: PathBuf,
        /// Annual interest rate for booked loans
        #[arg(long, default_value_t = 0.15)]
        rate: f64,
        /// First day of the schedules (today when omitted)
        #[arg(long)]
        start: Option<NaiveDate>,
    },

    /// Portfolio and application statistics
    Portfolio {
        #[arg(long, default_value = "microloan.db")]
        db: PathBuf,
    },
}

#[derive(clap::Args)]
struct ScoreArgs {
    #[arg(long)]
    income: f64,
    #[arg(long, default_value_t = 0.0)]
    expenses: f64,
    #[arg(long, default_value_t = 0.0)]
    debt: f64,
    #[arg(long, default_value_t = 0.0)]
    savings: f64,
    #[arg(long)]
    age: u32,
    #[arg(long, default_value = "Employed")]
    employment_status: String,
    #[arg(long, default_value_t = 0)]
    employment_years: u32,
    #[arg(long, default_value = "No Credit History")]
    credit_history: String,
    #[arg(long, default_value_t = 0)]
    dependents: u32,
    /// Requested amount
    #[arg(long)]
    amount: f64,
    #[arg(long, default_value_t = 12)]
    term: u32,
    /// Print the assessment as JSON
    #[arg(long)]
    json: bool,
}

#[derive(clap::Args)]
struct ScheduleArgs {
    #[arg(long)]
    principal: f64,
    /// Annual rate as a decimal (0.15 = 15%)
    #[arg(long)]
    rate: f64,
    #[arg(long)]
    term: u32,
    #[arg(long)]
    start: Option<NaiveDate>,
    #[arg(long, value_enum, default_value = "annuity")]
    method: MethodArg,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Annuity,
    EqualPrincipal,
}

fn load_assumptions(dir: Option<&Path>) -> Result<Assumptions> {
    match dir {
        Some(path) => Assumptions::from_csv_path(path)
            .with_context(|| format!("loading assumptions from {}", path.display())),
        None => Ok(Assumptions::default_lending()),
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let assumptions = load_assumptions(cli.assumptions.as_deref())?;

    match cli.command {
        Commands::Score(args) => score(assumptions, args),
        Commands::Schedule(args) => schedule(args),
        Commands::Products { score, income } => products(&assumptions, score, income),
        Commands::Process { applicants, db, rate, start } => {
            process(assumptions, &applicants, &db, rate, start.unwrap_or_else(|| Utc::now().date_naive()))
        }
        Commands::Portfolio { db } => portfolio(assumptions, &db),
    }
}

fn score(assumptions: Assumptions, args: ScoreArgs) -> Result<()> {
    let credit_history: CreditHistory = args
        .credit_history
        .parse()
        .map_err(anyhow::Error::msg)?;

    let applicant = Applicant::new(
        "CLI applicant",
        "",
        args.age,
        EmploymentStatus::from_label(&args.employment_status),
        args.employment_years,
        Financials {
            monthly_income: args.income,
            monthly_expenses: args.expenses,
            current_debt: args.debt,
            savings: args.savings,
        },
    )
    .with_credit_history(credit_history)
    .with_dependents(args.dependents);
    let request = LoanRequest::new(args.amount, "", args.term);

    let scorer = CreditScorer::new(assumptions);
    let assessment = scorer.score(&applicant, &request);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
        return Ok(());
    }

    println!("{}", explain(&assessment));
    let factors = scorer.risk_factors(&applicant, &request);
    if !factors.is_empty() {
        println!("\nRisk factors:");
        for factor in factors {
            println!("  [{}] {}", factor.category, factor.description);
        }
    }
    let products = scorer.qualified_products(&assessment, &applicant);
    if !products.is_empty() {
        println!("\nQualifying products:");
        for product in products {
            println!("  {} ({})", product.name, product.id);
        }
    }
    Ok(())
}

fn schedule(args: ScheduleArgs) -> Result<()> {
    let config = ScheduleConfig {
        method: match args.method {
            MethodArg::Annuity => ScheduleMethod::Annuity,
            MethodArg::EqualPrincipal => ScheduleMethod::EqualPrincipal,
        },
        ..ScheduleConfig::default()
    };
    let start = args.start.unwrap_or_else(|| Utc::now().date_naive());

    let payment = compute_monthly_payment(args.principal, args.rate, args.term)?;
    let rows = build_schedule(args.principal, payment, args.term, args.rate, start, &config)?;

    println!("{:>4} {:>12} {:>12} {:>12} {:>12} {:>12}", "No", "Due", "Amount", "Principal", "Interest", "Balance");
    println!("{}", "-".repeat(70));
    for row in &rows {
        println!(
            "{:>4} {:>12} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            row.installment_number, row.due_date, row.amount_due, row.principal, row.interest, row.balance_after
        );
    }
    println!("\nMonthly payment: {}", format_amount(payment));
    println!("Total repayment: {}", format_amount(total_repayment(&rows)));
    Ok(())
}

fn products(assumptions: &Assumptions, score: i32, income: f64) -> Result<()> {
    let catalog = &assumptions.catalog;
    let qualified = catalog.qualified(score, income);
    if qualified.is_empty() {
        println!("No products for score {} and income {}", score, format_amount(income));
        return Ok(());
    }

    for product in qualified {
        println!(
            "{:<20} {:>10} - {:>10}  {:>5.1}%/month  {:>2} months  suggested {}",
            product.name,
            format_amount(product.min_amount),
            format_amount(product.max_amount),
            product.monthly_rate * 100.0,
            product.term_months,
            format_amount(catalog.suggested_amount(product, income))
        );
    }
    Ok(())
}

fn process(assumptions: Assumptions, applicants: &Path, db_path: &Path, rate: f64, start: NaiveDate) -> Result<()> {
    let records = load_applicants(applicants)
        .with_context(|| format!("loading applicants from {}", applicants.display()))?;
    info!("Loaded {} applicants", records.len());

    let gateway = MobileMoneyFacade::new(SandboxProvider::new(assumptions.networks.clone()));
    let notifier = TemplateNotifier::new(assumptions.networks.clone());
    let db = Database::open(db_path)?;
    let service = LendingService::new(db, CreditScorer::new(assumptions), &gateway, &notifier);

    for (applicant, request) in records {
        let name = applicant.full_name.clone();
        let term = request.term_months;
        let application = service.submit_application(applicant, request)?;
        let application = service.assess_application(application.id)?;

        let suggested = application
            .assessment
            .as_ref()
            .map(|a| a.suggested_amount)
            .unwrap_or_default();
        println!("{:<24} {:<12} suggested {}", name, application.status, format_amount(suggested));

        if application.status != ApplicationStatus::Approved {
            continue;
        }

        let details = service.create_loan(application.id, suggested, rate, term, start)?;
        match service.disburse_loan(details.loan.id) {
            Ok(txn) => {
                info!("Loan {} provider reference {:?}", details.loan.id, txn.provider_reference);
                println!(
                    "  loan {} disbursement {}, {} per month",
                    details.loan.id,
                    txn.status.as_str(),
                    format_amount(details.loan.monthly_payment)
                );
            }
            Err(e) if e.is_retryable() => println!("  loan {} not disbursed yet: {}", details.loan.id, e),
            Err(e) => return Err(e.into()),
        }
    }

    let settled = service.reconcile_pending()?;
    info!("Reconciled {} pending transactions", settled.len());

    let reminders = service.send_default_reminders(start)?;
    info!("Sent {} payment reminders", reminders);

    print_stats(&service)
}

fn print_stats<G: PaymentGateway, N: Notifier>(service: &LendingService<'_, G, N>) -> Result<()> {
    let applications = service.application_stats()?;
    let portfolio = service.portfolio_stats()?;

    println!("\nApplications: {} ({} approved, {} conditional, {} rejected, {} pending)",
        applications.total_applications,
        applications.approved,
        applications.conditional,
        applications.rejected,
        applications.pending,
    );
    println!("Approval rate: {:.1}%", applications.approval_rate * 100.0);
    println!("\nLoans: {} ({} active, {} completed, {} defaulted)",
        portfolio.total_loans,
        portfolio.active_loans,
        portfolio.completed_loans,
        portfolio.defaulted_loans,
    );
    println!("  Disbursed:    {}", format_amount(portfolio.total_disbursed));
    println!("  Collected:    {}", format_amount(portfolio.total_collected));
    println!("  Outstanding:  {}", format_amount(portfolio.outstanding_balance));
    println!("  Default rate: {:.1}%", portfolio.default_rate * 100.0);
    println!("  Average loan: {} over {:.1} months", format_amount(portfolio.average_loan_amount), portfolio.average_term_months);
    Ok(())
}

fn portfolio(assumptions: Assumptions, db_path: &Path) -> Result<()> {
    let gateway = MobileMoneyFacade::new(SandboxProvider::new(assumptions.networks.clone()));
    let notifier = TemplateNotifier::new(assumptions.networks.clone());
    let db = Database::open(db_path)?;
    let service = LendingService::new(db, CreditScorer::new(assumptions), &gateway, &notifier);
    print_stats(&service)
}
