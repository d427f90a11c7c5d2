#[cotask::task]
fn not_async() -> cotask::Result<u32> {
    Ok(1)
}

fn main() {}
