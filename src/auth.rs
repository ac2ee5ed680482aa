use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

const PASSPHRASE_ENV: &str = "STICKYVAULT_PASSPHRASE";

fn from_env() -> Option<Zeroizing<String>> {
    //  STICKYVAULT_PASSPHRASE="hunter2" stickyvault import backup.zip
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

/// Passphrase for opening an existing vault.
pub fn read_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env() {
        return Ok(pw);
    }

    //  echo "hunter2" | stickyvault import backup.zip
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    } else {
        let pw = Zeroizing::new(rpassword::prompt_password("Vault passphrase: ")?);
        if !pw.is_empty() {
            return Ok(pw);
        }
    }

    bail!("no passphrase provided")
}

/// Passphrase for a new vault, confirmed when typed interactively.
pub fn read_new_passphrase() -> Result<Zeroizing<String>> {
    if let Some(pw) = from_env() {
        return Ok(pw);
    }

    let (pw1, pw2) = if io::stdin().is_terminal() {
        (
            Zeroizing::new(rpassword::prompt_password("New vault passphrase: ")?),
            Zeroizing::new(rpassword::prompt_password("Confirm passphrase: ")?),
        )
    } else {
        let stdin = io::stdin();
        let mut handle = stdin.lock();

        let mut pw1 = Zeroizing::new(String::new());
        let mut pw2 = Zeroizing::new(String::new());
        handle.read_line(&mut pw1)?;
        handle.read_line(&mut pw2)?;
        trim_newline(&mut pw1);
        trim_newline(&mut pw2);
        (pw1, pw2)
    };

    if pw1.is_empty() {
        bail!("passphrase cannot be empty");
    }

    if *pw1 != *pw2 {
        bail!("passphrases do not match");
    }

    Ok(pw1)
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
