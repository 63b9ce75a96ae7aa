//! Built-in twelve-topic life-story curriculum.

/// `(title, objective, questions)` for each built-in topic, in interview order.
pub(super) const BUILTIN_TOPICS: &[(&str, &str, &[&str])] = &[
    (
        "Prologue: My Roots and the World I Was Born Into",
        "Learn where the storyteller comes from: birthplace, family line, and the times they were born into.",
        &[
            "Where were you born, and what was that place like back then?",
            "Could you tell me about your grandparents and your parents?",
            "What was happening in the world around the time you were born?",
            "How many brothers and sisters did you have, and where did you fall among them?",
            "Is there a family story that was told again and again when you were small?",
        ],
    ),
    (
        "Treasured Memories of Childhood",
        "Gather vivid scenes from early childhood: home, play, neighbours, and first lessons.",
        &[
            "What do you remember about the house you grew up in?",
            "What games did you love to play as a child, and with whom?",
            "Who was the grown-up you felt closest to as a child?",
            "What was your first day of school like?",
            "Is there a smell, a song, or a taste that takes you straight back to childhood?",
        ],
    ),
    (
        "Growing Dreams: The Teenage Years",
        "Understand the dreams, friendships, and struggles of adolescence.",
        &[
            "What did you dream of becoming when you were a teenager?",
            "Who was your closest friend in those years?",
            "Was there a teacher or mentor who shaped you?",
            "What was the hardest thing you faced as a young person?",
            "What did you do for fun when you had free time?",
        ],
    ),
    (
        "Stepping Into the World: Early Adulthood",
        "Trace the move from home into independent life, first work, and new responsibilities.",
        &[
            "When did you first feel like an adult?",
            "What was your very first job, and how did you get it?",
            "Did you leave home? Where did you go, and how did it feel?",
            "What surprised you most about life on your own?",
        ],
    ),
    (
        "Love and Partnership",
        "Hear the story of love, courtship, and building a life with someone.",
        &[
            "How did you meet the person who became your partner?",
            "What drew you to them?",
            "What do you remember about your wedding or the day you decided to share a life?",
            "What did the two of you learn from each other over the years?",
        ],
    ),
    (
        "Becoming a Parent",
        "Capture the experience of raising children or caring for the next generation.",
        &[
            "What do you remember about the day your first child was born?",
            "What was the hardest part of raising children in those times?",
            "What values did you most want to pass on?",
            "Is there a moment with your children you will never forget?",
        ],
    ),
    (
        "Work and Calling",
        "Explore working life: the craft, the colleagues, and the meaning found in work.",
        &[
            "What work did you spend most of your life doing?",
            "What were you proudest of in your working life?",
            "Who were the people you worked alongside that you still think about?",
            "How did your work change over the years?",
        ],
    ),
    (
        "Trials and Turning Points",
        "Understand hardships endured and the moments that changed the direction of life.",
        &[
            "What was the most difficult period of your life?",
            "How did you find the strength to get through it?",
            "Was there a decision that changed everything afterward?",
            "Looking back, what did those hard times teach you?",
        ],
    ),
    (
        "Friends and Community",
        "Gather memories of friendship, neighbours, and the communities that held the storyteller.",
        &[
            "Who have been your truest friends over the years?",
            "What community or neighbourhood did you feel you belonged to?",
            "Was there a time someone helped you when you needed it most?",
            "How did you help others in your community?",
        ],
    ),
    (
        "Joys and Passions",
        "Celebrate hobbies, travel, faith, and the things that brought happiness.",
        &[
            "What has brought you the most joy in life?",
            "Is there a hobby or passion you have kept through the years?",
            "What was the most memorable journey you ever took?",
            "What small everyday pleasures do you treasure?",
        ],
    ),
    (
        "Wisdom of the Years",
        "Draw out reflections, lessons, and the storyteller's view of a life lived.",
        &[
            "What do you understand now that you wish you had known when you were young?",
            "How have your values changed over your life?",
            "What are you most grateful for?",
            "Is there anything you would do differently?",
        ],
    ),
    (
        "Epilogue: Messages to Those Who Follow",
        "Record the storyteller's hopes and words for family and future generations.",
        &[
            "What would you like your grandchildren to know about you?",
            "What hopes do you hold for the people you love?",
            "How would you like to be remembered?",
            "If you could give one piece of advice to a young person today, what would it be?",
        ],
    ),
];
