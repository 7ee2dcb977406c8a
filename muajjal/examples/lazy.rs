//! Lazy registrations: a cheap stand-in now, the real service on first use.

use std::sync::Arc;

use muajjal::prelude::*;

// === Contracts ===

trait Mailer: Send + Sync {
    fn send(&self, to: &str) -> Result<String>;
}

trait Reports: Send + Sync {
    fn monthly(&self) -> Result<String>;
}

// === Implementations ===

struct SmtpMailer {
    host: String,
}

impl SmtpMailer {
    fn connect(host: &str) -> Self {
        println!("[SMTP] connecting to {host}");
        Self { host: host.to_string() }
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, to: &str) -> Result<String> {
        Ok(format!("sent to {to} via {}", self.host))
    }
}

struct PdfReports {
    mailer: Arc<dyn Mailer>,
}

impl Reports for PdfReports {
    fn monthly(&self) -> Result<String> {
        self.mailer.send("finance@example.com")
    }
}

// === Stand-ins ===

struct MailerStandIn(Deferred<dyn Mailer>);

impl Mailer for MailerStandIn {
    fn send(&self, to: &str) -> Result<String> {
        self.0.get()?.send(to)
    }
}

impl LazyContract for dyn Mailer {
    fn stand_in(deferred: Deferred<Self>) -> Arc<Self> {
        Arc::new(MailerStandIn(deferred))
    }
}

struct ReportsStandIn(Deferred<dyn Reports>);

impl Reports for ReportsStandIn {
    fn monthly(&self) -> Result<String> {
        self.0.get()?.monthly()
    }
}

impl LazyContract for dyn Reports {
    fn stand_in(deferred: Deferred<Self>) -> Arc<Self> {
        Arc::new(ReportsStandIn(deferred))
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("muajjal=debug")
        .init();

    let container = Container::builder()
        .singleton_value(String::from("smtp.example.com"))
        // Mailer: one connection for the whole application, opened on first send
        .register_lazy::<dyn Mailer>(
            |r, _| {
                let host: Arc<String> = r.resolve()?;
                Ok(Arc::new(SmtpMailer::connect(&host)) as Arc<dyn Mailer>)
            },
            LazyOptions::new().lifetime(ServiceLifetime::SingleInstance),
        )
        // Reports: one per scope, receives the mailer stand-in
        .register_lazy::<dyn Reports>(
            |r, _| Ok(Arc::new(PdfReports { mailer: r.resolve()? }) as Arc<dyn Reports>),
            LazyOptions::new().lifetime(ServiceLifetime::InstancePerLifetimeScope),
        )
        .build()?;

    let request = container.create_scope();
    let reports: Arc<dyn Reports> = request.resolve()?;
    println!("Resolved reports, nothing connected yet");

    println!("{}", reports.monthly()?);
    println!("{}", reports.monthly()?);

    Ok(())
}
