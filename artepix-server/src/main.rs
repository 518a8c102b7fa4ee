use artepix_common::email::senders::{MockSender, SmtpSender};
use artepix_common::email::EmailSender;
use artepix_common::otp::{EmailOtpDelivery, OtpManager};

use actix_web::web::Data;
use actix_web::{App, HttpServer};
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, LogSpecification, Logger, Naming, WriteMode,
};

mod env;
mod handlers;
mod middleware;
mod services;

use middleware::CorsMiddleware;
use services::api::RouteLimiters;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let mut port = 8000u16;

    let mut args = std::env::args();

    // Eat the first argument, which is the relative path to the executable
    args.next();

    while let Some(arg) = args.next() {
        match arg.to_lowercase().as_str() {
            "--port" => {
                let port_str = {
                    let next_arg = args.next();

                    match next_arg {
                        Some(s) => s,
                        None => {
                            eprintln!("ERROR: --port option specified but no port was given");
                            std::process::exit(1);
                        }
                    }
                };

                port = {
                    let port_result = port_str.parse::<u16>();

                    match port_result {
                        Ok(p) => p,
                        Err(_) => {
                            eprintln!("ERROR: Incorrect format for port. Integer expected");
                            std::process::exit(1);
                        }
                    }
                };

                continue;
            }
            a => {
                eprintln!("ERROR: Invalid argument: {}", &a);
                std::process::exit(1);
            }
        }
    }

    let log_spec = LogSpecification::parse(&env::CONF.log_level).unwrap_or_else(|_| {
        eprintln!("WARNING: Invalid log level '{}'. Using info", env::CONF.log_level);
        LogSpecification::info()
    });

    let _logger = match Logger::with(log_spec)
        .log_to_file(FileSpec::default().directory("./logs"))
        .rotate(
            Criterion::Age(Age::Day),
            Naming::Timestamps,
            Cleanup::KeepLogAndCompressedFiles(60, 365),
        )
        .cleanup_in_background_thread(true)
        .duplicate_to_stdout(Duplicate::All)
        .write_mode(WriteMode::Async)
        .format(|writer, now, record| {
            write!(
                writer,
                "{:5} | {} | {}:{} | {}",
                record.level(),
                now.format("%Y-%m-%dT%H:%M:%S%.6fZ"),
                record.module_path().unwrap_or("<unknown>"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .use_utc()
        .start()
    {
        Ok(l) => l,
        Err(e) => {
            eprintln!("ERROR: Failed to start logger: {e}");
            std::process::exit(1);
        }
    };

    let email_sender: EmailSender = if env::CONF.email_enabled {
        log::info!("Connecting to SMTP relay...");

        let smtp_sender = match SmtpSender::with_credentials(
            &env::CONF.smtp_username,
            &env::CONF.smtp_password,
            &env::CONF.smtp_address,
            env::CONF.smtp_port,
            env::CONF.max_smtp_connections,
            env::CONF.smtp_idle_timeout,
        ) {
            Ok(s) => s,
            Err(e) => {
                log::error!("Failed to set up SMTP relay: {e}");
                std::process::exit(1);
            }
        };

        match smtp_sender.test_connection().await {
            Ok(true) => (),
            Ok(false) => {
                log::error!("Failed to connect to SMTP relay");
                std::process::exit(1);
            }
            Err(e) => {
                log::error!("Failed to connect to SMTP relay: {e}");
                std::process::exit(1);
            }
        }

        log::info!("Successfully connected to SMTP relay");

        Box::new(smtp_sender)
    } else {
        log::info!("Emails are disabled. Using mock sender.");
        Box::new(MockSender::new())
    };

    let otp_delivery = EmailOtpDelivery::new(
        email_sender,
        env::CONF.email_from_address.clone(),
        env::CONF.email_reply_to_address.clone(),
        env::CONF.otp_lifetime,
    );

    // One manager shared by every worker so a code issued on one worker verifies on another
    let otp_manager = Data::new(OtpManager::new(
        env::CONF.otp_settings(),
        Box::new(otp_delivery),
    ));

    let limiters = RouteLimiters::default();
    let cors_allowed_origins = env::CONF.cors_allowed_origins.clone();

    log::info!("Starting server on port {port}");

    HttpServer::new(move || {
        App::new()
            .app_data(otp_manager.clone())
            .configure(|cfg| services::api::configure(cfg, limiters.clone()))
            .configure(services::web::configure)
            .wrap(CorsMiddleware::new(cors_allowed_origins.clone()))
            .wrap(actix_web::middleware::Logger::default())
    })
    .workers(env::CONF.actix_worker_count)
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    // All workers have stopped, so nothing else can be reading the config
    unsafe {
        env::CONF.zeroize();
    }

    Ok(())
}
