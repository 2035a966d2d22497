//! `pgo password` - generate a password and its md5 role hash

use anyhow::Result;
use provision::md5_role_password;

use crate::cli::PasswordArgs;
use crate::password;

pub fn run(args: PasswordArgs) -> Result<()> {
    let password = args.password.unwrap_or_else(password::generate);
    let hash = md5_role_password(&args.username, &password);

    println!("Username: {}", args.username);
    println!("Password: {password}");
    println!("Password MD5: {hash}");
    Ok(())
}
