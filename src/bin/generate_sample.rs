use chrono::{Datelike, Days, NaiveDate};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// (product, category, lab, list price)
const PRODUCTS: [(&str, &str, &str, f64); 8] = [
    ("Paracetamol 500mg", "Analgésicos", "Genfar", 4.5),
    ("Ibuprofeno 400mg", "Antiinflamatorios", "Bayer", 6.0),
    ("Amoxicilina 500mg", "Antibióticos", "Pfizer", 12.0),
    ("Loratadina 10mg", "Antialérgicos", "Medifarma", 5.5),
    ("Omeprazol 20mg", "Gastrointestinales", "AstraZeneca", 9.0),
    ("Metformina 850mg", "Antidiabéticos", "Merck", 7.5),
    ("Atorvastatina 20mg", "Cardiovasculares", "Pfizer", 15.0),
    ("Vitamina C 1g", "Suplementos", "Bayer", 3.5),
];

// Region spellings are deliberately inconsistent, as in real exports.
const REGIONS: [&str; 8] = [
    "Lima", "lima", "LIMA ", "Arequipa", "arequipa", "Cusco", "Trujillo", "Piura",
];
const CHANNELS: [&str; 4] = ["Farmacia", "Hospital", "Online", "Distribuidor"];
const SALESPEOPLE: [&str; 6] = ["Ana Torres", "Luis Quispe", "Rosa Díaz", "Carlos Ramos", "María Flores", "Jorge Salas"];

fn main() {
    let mut rng = SimpleRng::new(42);

    let start = NaiveDate::from_ymd_opt(2023, 1, 1).expect("valid start date");
    let days = 730;
    let rows_per_day = 6;

    let output_path = "pharma_data_altibajos.csv";
    let mut writer = csv::Writer::from_path(output_path).expect("Failed to create output file");
    writer
        .write_record([
            "Fecha", "Región", "Producto", "Canal", "Categoría", "Laboratorio", "Vendedor", "Ventas",
            "Unidades", "Inventario",
        ])
        .expect("Failed to write header");

    let mut inventory: Vec<f64> = vec![800.0; PRODUCTS.len()];
    let mut written = 0usize;

    for day in 0..days {
        let date = start + Days::new(day);
        // Seasonal ups and downs: winter peak (southern hemisphere), weekend dip.
        let season = 1.0 + 0.35 * ((date.ordinal() as f64 / 365.0 - 0.45) * 2.0 * std::f64::consts::PI).cos();
        let weekday = if date.weekday().num_days_from_monday() >= 5 { 0.6 } else { 1.0 };

        for _ in 0..rows_per_day {
            let p = (rng.next_u64() % PRODUCTS.len() as u64) as usize;
            let (product, category, lab, price) = PRODUCTS[p];

            let demand = rng.gauss(12.0 * season * weekday, 4.0).round().max(0.0);
            let units = demand.min(inventory[p]);
            inventory[p] -= units;
            if inventory[p] < 150.0 {
                inventory[p] += 600.0 + rng.next_f64() * 400.0;
            }
            let sales = (units * price * (0.9 + rng.next_f64() * 0.2) * 100.0).round() / 100.0;

            writer
                .write_record([
                    date.format("%Y-%m-%d").to_string(),
                    rng.pick(&REGIONS).to_string(),
                    product.to_string(),
                    rng.pick(&CHANNELS).to_string(),
                    category.to_string(),
                    lab.to_string(),
                    rng.pick(&SALESPEOPLE).to_string(),
                    sales.to_string(),
                    (units as u64).to_string(),
                    inventory[p].round().to_string(),
                ])
                .expect("Failed to write record");
            written += 1;
        }
    }
    writer.flush().expect("Failed to flush CSV");

    println!("Wrote {written} sales records ({days} days) to {output_path}");
}
