//! HTML pages served by the password reset link.

use std::fmt;

const STYLE: &str = "\
        <style>
            * { margin: 0; padding: 0; }
            html, body { height: 100%; }
            main { display: flex; flex-direction: column; height: 100%; }
            nav { background: #000; height: 50px; border-top: 5px solid #ffd600; }
            .content { flex: 1; padding: 40px 20px; text-align: center; font-family: sans-serif; }
            p { margin-bottom: 12px; }
        </style>";

/// Page shown when a reset link could not be used.
pub const RESET_FAILED_PAGE: &str = r#"<!doctype html>
<html>
    <head>
        <title>Password Reset Failed</title>
    </head>
    <body>
        <main>
            <nav></nav>
            <div class="content">
                <p>There was an error resetting your password.</p>
                <p>Please try again or contact support if the issue persists.</p>
            </div>
        </main>
    </body>
</html>
"#;

/// Page shown after a successful reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetPage;

impl fmt::Display for ResetPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"<!doctype html>
<html>
    <head>
        <title>Password Reset Successful</title>
{STYLE}
    </head>
    <body>
        <main>
            <nav></nav>
            <div class="content">
                <p>Password reset was successful.</p>
                <p>Please check your email for a temporary password to access your account.</p>
            </div>
        </main>
    </body>
</html>
"#
        )
    }
}
