use anyhow::Result;
use ndarray::Array2;
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;

use pgn_layers::{seeded_rng, InMemoryEmbeddings, PointerGenerator, RnnType, ScoreType, Seq2SeqConfig};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let vocab_size = 20;
    let embedding_dim = 8;
    let batch_size = 5;
    let input_length = 4;
    let output_length = 3;

    let config = Seq2SeqConfig::new(vocab_size, embedding_dim, 10, batch_size)
        .with_rnn_type(RnnType::Lstm)
        .with_bidirectional(true)
        .with_score_type(ScoreType::CosineSimilarity);

    // stand-in for a pretrained word-vector table
    let provider = InMemoryEmbeddings::random(vocab_size, embedding_dim, 42);
    let model = PointerGenerator::from_provider(config, &provider)?;

    let mut rng = seeded_rng(7);
    let ids = Uniform::new(0u32, vocab_size as u32);
    let input = Array2::random_using((batch_size, input_length), ids, &mut rng);
    let start = Array2::random_using((batch_size, 1), ids, &mut rng).column(0).to_owned();

    let predictions = model.greedy_decode(&input, None, &start, output_length)?;

    println!("{:?}", predictions.shape());
    println!("{}", predictions);
    Ok(())
}
