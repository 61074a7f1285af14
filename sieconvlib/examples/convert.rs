use sieconvlib::{
    formats::sie::Sie,
    traits::{ReadFormat, WriteFormat},
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Пример: нормализуем SIE (stdin -> stdout)
    let doc = Sie.read(std::io::BufReader::new(std::io::stdin()))?;
    Sie.write(std::io::stdout(), &doc)?;
    Ok(())
}
