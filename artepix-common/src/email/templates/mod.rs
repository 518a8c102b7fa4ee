use std::time::Duration;

pub struct OtpMessage {}

impl OtpMessage {
    pub const SUBJECT: &'static str = "Kode Verifikasi ARTEPIX Anda";

    pub fn generate(otp: &str, otp_lifetime: Duration) -> String {
        format!(
            "<!DOCTYPE html>
             <html lang=\"id\">
               <head>
                 <meta charset=\"UTF-8\">
                 <title>Kode Verifikasi ARTEPIX</title>
                 <style>
                   body {{
                     font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
                     background-color: #0a1214;
                     color: #ffffff;
                     text-align: center;
                   }}
                 </style>
               </head>
             <body>
               <h1 style=\"color: #B8FF00; letter-spacing: 3px;\">ARTEPIX</h1>
               <p style=\"color: rgba(255,255,255,0.5);\">Smart Packaging Solutions</p>
               <h2>Kode Verifikasi Anda</h2>
               <p>Masukkan kode berikut untuk memverifikasi akun Anda. Kode ini berlaku \
               selama <b style=\"color: #B8FF00;\">{} menit</b>.</p>
               <h2 style=\"font-family: 'Courier New', monospace; font-size: 42px; \
               letter-spacing: 12px; color: #B8FF00; user-select: all; \
               -webkit-user-select: all;\"><b>{}</b></h2>
               <p>Jangan bagikan kode ini kepada siapapun. Tim ARTEPIX tidak pernah meminta \
               kode verifikasi Anda.</p>
               <p style=\"color: rgba(255,255,255,0.4);\">Jika Anda tidak meminta kode ini, \
               abaikan email ini.</p>
             </body>
             </html>",
            otp_lifetime.as_secs() / 60,
            otp,
        )
    }
}
